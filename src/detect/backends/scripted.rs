use std::collections::VecDeque;

use anyhow::{anyhow, Result};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::RawDetection;
use crate::frame::Frame;

/// Scripted backend for demos and tests.
///
/// Replays queued outcomes in order. Once the queue is drained it keeps returning the
/// last successful batch, or an empty batch when nothing succeeded yet.
pub struct ScriptedBackend {
    script: VecDeque<Result<Vec<RawDetection>, String>>,
    last: Vec<RawDetection>,
    calls: u64,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            script: VecDeque::new(),
            last: Vec::new(),
            calls: 0,
        }
    }

    /// Queue a successful batch.
    pub fn then_detect(mut self, detections: Vec<RawDetection>) -> Self {
        self.script.push_back(Ok(detections));
        self
    }

    /// Queue a failure.
    pub fn then_fail(mut self, message: impl Into<String>) -> Self {
        self.script.push_back(Err(message.into()));
        self
    }

    /// Number of `detect` calls served so far.
    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<RawDetection>> {
        self.calls += 1;
        match self.script.pop_front() {
            Some(Ok(detections)) => {
                self.last = detections.clone();
                Ok(detections)
            }
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok(self.last.clone()),
        }
    }
}
