//! The detection loop.
//!
//! ```text
//! Idle --start--> Running --detector ok, still Running--> next request
//!                    |  \--detector error--> Idle (fail-stop)
//!                    \--stop--> Idle (in-flight result still applied once)
//! ```
//!
//! One worker task owns the request chain. Start, stop, reset and the worker's own
//! exit decision all go through the `Control` mutex, so there is never more than one
//! worker and never more than one outstanding detector request. Stop is cooperative:
//! it is only observed between cycles.

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::detect::RawDetection;
use crate::error::PipelineError;
use crate::frame::{Frame, FrameDimensions, SharedSource};
use crate::pipeline::{AsyncDetector, LoopState, Session};
use crate::record::{normalize_batch, DetectionSet};
use crate::render::{fan_out, DetectionConsumer};

/// Counters for one session (cleared on reset).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub requests_issued: u64,
    pub cycles_completed: u64,
    pub detector_failures: u64,
    pub malformed_dropped: u64,
    pub render_failures: u64,
    pub stale_discarded: u64,
}

struct Control {
    worker_alive: bool,
    worker: Option<JoinHandle<()>>,
    epoch: u64,
    cycle: u64,
    last_error: Option<PipelineError>,
    stats: LoopStats,
}

struct LoopInner {
    session: Arc<Session>,
    source: SharedSource,
    detector: AsyncDetector,
    // Lock order: consumers before control.
    consumers: Mutex<Vec<Box<dyn DetectionConsumer>>>,
    control: Mutex<Control>,
    runtime: Handle,
}

/// Start/stop/reset handle for the detection loop. Cheap to clone.
#[derive(Clone)]
pub struct DetectionLoop {
    inner: Arc<LoopInner>,
}

impl DetectionLoop {
    /// Build a loop bound to the current Tokio runtime.
    ///
    /// Fails when called outside a runtime. After construction the control methods may
    /// be called from any thread.
    pub fn new(
        session: Arc<Session>,
        source: SharedSource,
        detector: AsyncDetector,
        consumers: Vec<Box<dyn DetectionConsumer>>,
    ) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| anyhow!("detection loop requires a Tokio runtime: {}", e))?;
        Ok(Self {
            inner: Arc::new(LoopInner {
                session,
                source,
                detector,
                consumers: Mutex::new(consumers),
                control: Mutex::new(Control {
                    worker_alive: false,
                    worker: None,
                    epoch: 0,
                    cycle: 0,
                    last_error: None,
                    stats: LoopStats::default(),
                }),
                runtime,
            }),
        })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.inner.session
    }

    pub fn state(&self) -> LoopState {
        self.inner.session.state()
    }

    /// Begin detecting. Returns false (and does nothing) when already Running.
    pub fn start(&self) -> bool {
        let mut ctl = self.inner.lock_control();
        if self.inner.session.state() == LoopState::Running {
            return false;
        }
        self.inner.session.set_state(LoopState::Running);
        ctl.last_error = None;
        if ctl.worker_alive {
            // A stopped cycle is still in flight; that worker carries on after it lands.
            log::debug!("detection resumed with a request in flight");
        } else {
            ctl.worker_alive = true;
            let inner = Arc::clone(&self.inner);
            ctl.worker = Some(self.inner.runtime.spawn(run_worker(inner)));
            log::info!("detection started");
        }
        true
    }

    /// Stop detecting after the in-flight request, if any. Returns false when already Idle.
    pub fn stop(&self) -> bool {
        let _ctl = self.inner.lock_control();
        if self.inner.session.state() == LoopState::Idle {
            return false;
        }
        self.inner.session.set_state(LoopState::Idle);
        log::info!("detection stopped");
        true
    }

    /// Discard the whole session and rebuild it from Idle.
    ///
    /// Renderers are re-rendered with the empty set. A request issued before the reset
    /// may still be in flight; its result is dropped when it lands.
    pub fn reset(&self) {
        let mut consumers = self.inner.lock_consumers();
        let empty = {
            let mut ctl = self.inner.lock_control();
            self.inner.session.set_state(LoopState::Idle);
            ctl.epoch += 1;
            ctl.cycle = 0;
            ctl.last_error = None;
            ctl.stats = LoopStats::default();
            let empty = DetectionSet::empty();
            self.inner.session.publish(empty.clone());
            empty
        };
        let report = fan_out(&mut consumers, &empty);
        self.inner.lock_control().stats.render_failures += report.failures.len() as u64;
        log::info!("session reset");
    }

    /// Wait until no worker task is alive (after stop, failure or reset).
    pub async fn settled(&self) {
        loop {
            let worker = self.inner.lock_control().worker.take();
            match worker {
                Some(handle) => {
                    if let Err(e) = handle.await {
                        log::error!("detection worker ended abnormally: {}", e);
                    }
                }
                None => return,
            }
        }
    }

    pub fn stats(&self) -> LoopStats {
        self.inner.lock_control().stats.clone()
    }

    /// Error that halted the loop most recently, cleared by `start` and `reset`.
    pub fn last_error(&self) -> Option<PipelineError> {
        self.inner.lock_control().last_error.clone()
    }
}

impl LoopInner {
    fn lock_control(&self) -> MutexGuard<'_, Control> {
        self.control
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_consumers(&self) -> MutexGuard<'_, Vec<Box<dyn DetectionConsumer>>> {
        self.consumers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn capture(&self) -> Result<Frame, PipelineError> {
        let mut source = self
            .source
            .lock()
            .map_err(|_| PipelineError::detector("frame source lock poisoned"))?;
        source
            .next_frame()
            .map_err(|e| PipelineError::detector(format!("frame capture failed: {:#}", e)))
    }

    /// Capture a frame and run one detector request. The only suspension point.
    async fn request(&self) -> Result<(FrameDimensions, Vec<RawDetection>), PipelineError> {
        let frame = self.capture()?;
        let dimensions = frame.dimensions();
        let raws = self.detector.detect(frame).await?;
        Ok((dimensions, raws))
    }

    /// Apply one completed request.
    ///
    /// Returns the epoch to issue the next request under, or `None` when the worker
    /// should exit. A worker that survived a reset serves the new session.
    fn complete(
        &self,
        epoch: u64,
        outcome: Result<(FrameDimensions, Vec<RawDetection>), PipelineError>,
    ) -> Option<u64> {
        let mut consumers = self.lock_consumers();
        let (published, next) = {
            let mut ctl = self.lock_control();
            let mut published = None;
            let mut failed = false;

            if ctl.epoch != epoch {
                ctl.stats.stale_discarded += 1;
                log::debug!("discarding detector result issued before reset");
            } else {
                match outcome {
                    Ok((dimensions, raws)) => {
                        let (records, rejected) = normalize_batch(&raws, dimensions);
                        ctl.cycle += 1;
                        ctl.stats.cycles_completed += 1;
                        ctl.stats.malformed_dropped += rejected.len() as u64;
                        let set = DetectionSet::new(ctl.cycle, dimensions, records);
                        self.session.publish(set.clone());
                        log::debug!(
                            "cycle {}: {} detections ({} dropped)",
                            set.cycle(),
                            set.len(),
                            rejected.len()
                        );
                        published = Some(set);
                    }
                    Err(e) => {
                        log::error!("detection error: {}", e);
                        ctl.stats.detector_failures += 1;
                        ctl.last_error = Some(e);
                        self.session.set_state(LoopState::Idle);
                        failed = true;
                    }
                }
            }

            let keep_going = !failed && self.session.state() == LoopState::Running;
            let next = if keep_going {
                ctl.stats.requests_issued += 1;
                Some(ctl.epoch)
            } else {
                ctl.worker_alive = false;
                None
            };
            (published, next)
        };

        if let Some(set) = published {
            let report = fan_out(&mut consumers, &set);
            if !report.failures.is_empty() {
                self.lock_control().stats.render_failures += report.failures.len() as u64;
            }
        }
        next
    }
}

async fn run_worker(inner: Arc<LoopInner>) {
    let mut epoch = {
        let mut ctl = inner.lock_control();
        ctl.stats.requests_issued += 1;
        ctl.epoch
    };
    loop {
        let outcome = inner.request().await;
        match inner.complete(epoch, outcome) {
            Some(next) => epoch = next,
            None => break,
        }
    }
    log::debug!("detection worker exited");
}
