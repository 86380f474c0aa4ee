//! Terminal presentation for `overlayd`: startup stages and the live status line.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

use crate::pipeline::{LoopState, LoopStats};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

impl UiMode {
    pub fn parse(flag: Option<&str>) -> Self {
        match flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        Self { mode, is_tty }
    }

    fn pretty(&self) -> bool {
        match self.mode {
            UiMode::Pretty => true,
            UiMode::Plain => false,
            UiMode::Auto => self.is_tty,
        }
    }

    /// Announce a startup stage; completion and elapsed time are reported on drop.
    pub fn stage(&self, name: &str) -> StageGuard {
        if self.pretty() {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            spinner.set_style(
                ProgressStyle::with_template("{spinner} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }

    /// Status line that follows the loop state and cycle counters.
    pub fn status(&self) -> StatusLine {
        let bar = if self.pretty() {
            let bar = ProgressBar::new_spinner();
            bar.set_draw_target(ProgressDrawTarget::stderr());
            bar.set_style(
                ProgressStyle::with_template("{prefix:.bold} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            Some(bar)
        } else {
            None
        };
        StatusLine {
            bar,
            last_state: None,
        }
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let message = format!("✔ {} ({})", self.name, format_duration(self.start.elapsed()));
        match &self.spinner {
            Some(spinner) => spinner.finish_with_message(message),
            None => eprintln!("{message}"),
        }
    }
}

/// Live `[state] label | counters` line.
///
/// In plain mode only state transitions are printed, one line each.
pub struct StatusLine {
    bar: Option<ProgressBar>,
    last_state: Option<LoopState>,
}

impl StatusLine {
    pub fn update(&mut self, state: LoopState, detections: usize, stats: &LoopStats) {
        let summary = status_summary(state, detections, stats);
        match &self.bar {
            Some(bar) => {
                bar.set_prefix(state_tag(state));
                bar.set_message(summary);
            }
            None => {
                if self.last_state != Some(state) {
                    eprintln!("{} {}", state_tag(state), summary);
                }
            }
        }
        self.last_state = Some(state);
    }

    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish();
        }
    }
}

fn state_tag(state: LoopState) -> &'static str {
    match state {
        LoopState::Idle => "[idle]",
        LoopState::Running => "[running]",
    }
}

/// Status text shown next to the state tag. The toggle label names the action the
/// next toggle performs.
pub fn status_summary(state: LoopState, detections: usize, stats: &LoopStats) -> String {
    format!(
        "{} | cycles {} | detections {} | failures {}",
        state.toggle_label(),
        stats.cycles_completed,
        detections,
        stats.detector_failures
    )
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
