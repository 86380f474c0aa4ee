use serde::Serialize;
use tokio::sync::watch;

use crate::record::DetectionSet;

/// Whether the detection loop keeps re-issuing requests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopState {
    #[default]
    Idle,
    Running,
}

impl LoopState {
    /// Label for the start/stop toggle control.
    pub fn toggle_label(&self) -> &'static str {
        match self {
            LoopState::Idle => "Start Detecting",
            LoopState::Running => "Stop Detecting",
        }
    }
}

/// Explicit pipeline session.
///
/// Holds the loop state and the current detection set. Both live in `watch` channels:
/// writers swap whole values, readers clone an `Arc`-backed snapshot, so nobody ever
/// observes a partially built set. Only the detection loop writes.
pub struct Session {
    state: watch::Sender<LoopState>,
    detections: watch::Sender<DetectionSet>,
}

impl Session {
    pub fn new() -> Self {
        let (state, _) = watch::channel(LoopState::Idle);
        let (detections, _) = watch::channel(DetectionSet::empty());
        Self { state, detections }
    }

    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    /// Snapshot of the current detection set.
    pub fn current(&self) -> DetectionSet {
        self.detections.borrow().clone()
    }

    /// Receiver notified on every published set.
    pub fn subscribe(&self) -> watch::Receiver<DetectionSet> {
        self.detections.subscribe()
    }

    /// Receiver notified on every state change (drives the toggle label).
    pub fn watch_state(&self) -> watch::Receiver<LoopState> {
        self.state.subscribe()
    }

    pub(crate) fn set_state(&self, state: LoopState) {
        self.state.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });
    }

    pub(crate) fn publish(&self, set: DetectionSet) {
        self.detections.send_replace(set);
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameDimensions;

    #[test]
    fn starts_idle_with_empty_set() {
        let session = Session::new();
        assert_eq!(session.state(), LoopState::Idle);
        assert!(session.current().is_empty());
        assert_eq!(session.current().cycle(), 0);
    }

    #[test]
    fn publish_replaces_the_whole_set() {
        let session = Session::new();
        let mut rx = session.subscribe();
        let dims = FrameDimensions::new(10, 10).unwrap();
        session.publish(DetectionSet::new(4, dims, Vec::new()));

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().cycle(), 4);
        assert_eq!(session.current().cycle(), 4);
    }

    #[test]
    fn state_changes_notify_only_on_transition() {
        let session = Session::new();
        let mut rx = session.watch_state();
        session.set_state(LoopState::Idle);
        assert!(!rx.has_changed().unwrap());

        session.set_state(LoopState::Running);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), LoopState::Running);
        assert_eq!(session.state().toggle_label(), "Stop Detecting");
    }
}
