use anyhow::anyhow;

use crate::detect::{RawDetection, SharedBackend};
use crate::error::PipelineError;
use crate::frame::Frame;

/// Asynchronous face of a blocking detector backend.
///
/// Each call runs the backend on Tokio's blocking pool and resolves once with either
/// the raw detections or a `DetectorFailure`. The caller guarantees that at most one
/// call is outstanding.
#[derive(Clone)]
pub struct AsyncDetector {
    backend: SharedBackend,
}

impl AsyncDetector {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }

    pub async fn detect(&self, frame: Frame) -> Result<Vec<RawDetection>, PipelineError> {
        let backend = self.backend.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            let mut guard = backend
                .lock()
                .map_err(|_| anyhow!("detector backend lock poisoned"))?;
            guard.detect(&frame)
        })
        .await
        .map_err(|e| PipelineError::detector(format!("detector task aborted: {}", e)))?;
        outcome.map_err(|e| PipelineError::detector(format!("{:#}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::ScriptedBackend;
    use crate::frame::FrameDimensions;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn resolves_with_backend_outcome() {
        let backend = ScriptedBackend::new()
            .then_detect(vec![RawDetection::new("cat", 0.9, 1.0, 2.0, 3.0, 4.0)])
            .then_fail("camera lost");
        let detector = AsyncDetector::new(Arc::new(Mutex::new(backend)));
        let dims = FrameDimensions::new(2, 2).unwrap();
        let frame = Frame::new(1, dims, vec![0u8; 12]).unwrap();

        let detections = detector.detect(frame.clone()).await.unwrap();
        assert_eq!(detections[0].label, "cat");

        let err = detector.detect(frame).await.unwrap_err();
        assert_eq!(err, PipelineError::DetectorFailure("camera lost".to_string()));
    }
}
