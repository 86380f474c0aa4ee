#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio::sync::{mpsc as async_mpsc, watch};

use live_overlay::render::{Chart, ChartHandle};
use live_overlay::{
    share_source, AsyncDetector, CameraConfig, CameraSource, ChartRenderer, DetectionConsumer,
    DetectionLoop, DetectionSet, DetectorBackend, Frame, LoopState, MarkupSlot, RawDetection,
    Session, SharedBackend, SharedSource, TableRenderer,
};

pub const WAIT: Duration = Duration::from_secs(5);

pub type Outcome = std::result::Result<Vec<RawDetection>, String>;

#[derive(Default)]
pub struct GateCounters {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicU64,
}

/// Detector backend that blocks every request until the test releases it.
pub struct GatedBackend {
    outcomes: mpsc::Receiver<Outcome>,
    entered: async_mpsc::UnboundedSender<u64>,
    counters: Arc<GateCounters>,
}

impl DetectorBackend for GatedBackend {
    fn name(&self) -> &'static str {
        "gated"
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<RawDetection>> {
        let call = self.counters.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let now = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _ = self.entered.send(call);
        let outcome = self.outcomes.recv();
        self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
        match outcome {
            Ok(Ok(detections)) => Ok(detections),
            Ok(Err(message)) => Err(anyhow!(message)),
            Err(_) => Err(anyhow!("gate closed")),
        }
    }
}

/// Test side of a `GatedBackend`.
pub struct Gate {
    release: Option<mpsc::Sender<Outcome>>,
    entered: async_mpsc::UnboundedReceiver<u64>,
    counters: Arc<GateCounters>,
}

impl Gate {
    /// Wait until the backend has received a request; returns its call number.
    pub async fn entered(&mut self) -> u64 {
        tokio::time::timeout(WAIT, self.entered.recv())
            .await
            .expect("detector request issued in time")
            .expect("gated backend alive")
    }

    pub fn release(&self, outcome: Outcome) {
        self.release
            .as_ref()
            .expect("gate open")
            .send(outcome)
            .expect("gated backend alive");
    }

    /// Drop the release side; any blocked request fails with "gate closed".
    pub fn close(&mut self) {
        self.release = None;
    }

    pub fn calls(&self) -> u64 {
        self.counters.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.counters.max_in_flight.load(Ordering::SeqCst)
    }

    /// True when no request arrived since the last `entered`.
    pub fn idle(&mut self) -> bool {
        self.entered.try_recv().is_err()
    }
}

pub fn gated_backend() -> (SharedBackend, Gate) {
    let (release, outcomes) = mpsc::channel();
    let (entered_tx, entered_rx) = async_mpsc::unbounded_channel();
    let counters = Arc::new(GateCounters::default());
    let backend = GatedBackend {
        outcomes,
        entered: entered_tx,
        counters: counters.clone(),
    };
    let shared: SharedBackend = Arc::new(Mutex::new(backend));
    let gate = Gate {
        release: Some(release),
        entered: entered_rx,
        counters,
    };
    (shared, gate)
}

pub fn camera() -> SharedSource {
    share_source(CameraSource::new(CameraConfig::default()).expect("stub camera"))
}

pub fn cat() -> RawDetection {
    RawDetection::new("cat", 0.92, 10.0, 20.0, 100.0, 50.0)
}

/// A loop wired to the gated backend with table and chart consumers.
pub struct Harness {
    pub session: Arc<Session>,
    pub source: SharedSource,
    pub detection: DetectionLoop,
    pub table: MarkupSlot,
    pub chart: ChartHandle,
    pub gate: Gate,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_extra_consumers(Vec::new())
    }

    pub fn with_extra_consumers(extra: Vec<Box<dyn DetectionConsumer>>) -> Self {
        let session = Arc::new(Session::new());
        let source = camera();
        let (backend, gate) = gated_backend();
        let table = MarkupSlot::new();
        let chart = ChartHandle::new(Chart::new());
        let mut consumers: Vec<Box<dyn DetectionConsumer>> = extra;
        consumers.push(Box::new(TableRenderer::new(table.clone())));
        consumers.push(Box::new(ChartRenderer::new(chart.clone())));
        let detection = DetectionLoop::new(
            session.clone(),
            source.clone(),
            AsyncDetector::new(backend),
            consumers,
        )
        .expect("inside a runtime");
        Self {
            session,
            source,
            detection,
            table,
            chart,
            gate,
        }
    }

    /// Wait until the published set reaches `cycle`.
    pub async fn wait_for_cycle(&self, cycle: u64) -> DetectionSet {
        let mut rx = self.session.subscribe();
        tokio::time::timeout(WAIT, async {
            loop {
                let current = rx.borrow_and_update().clone();
                if current.cycle() >= cycle {
                    return current;
                }
                rx.changed().await.expect("session alive");
            }
        })
        .await
        .expect("cycle published in time")
    }

    pub async fn wait_for_state(&self, state: LoopState) {
        let mut rx: watch::Receiver<LoopState> = self.session.watch_state();
        tokio::time::timeout(WAIT, rx.wait_for(|s| *s == state))
            .await
            .expect("state reached in time")
            .expect("session alive");
    }

    /// Stop, unblock any pending request and wait for the worker to exit.
    pub async fn shutdown(&mut self) {
        self.detection.stop();
        self.gate.close();
        tokio::time::timeout(WAIT, self.detection.settled())
            .await
            .expect("worker settled in time");
    }
}

/// Number of `<tbody>` rows in rendered table markup.
pub fn body_rows(html: &str) -> usize {
    html.matches("<tr>").count().saturating_sub(1)
}
