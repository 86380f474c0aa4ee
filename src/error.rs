use thiserror::Error;

/// Failures the detection pipeline recovers from locally.
///
/// None of these end the process. The worst outcome is a halted detection loop with a
/// logged diagnostic.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    /// A single raw detection failed normalization. The record is dropped from its batch.
    #[error("malformed detection '{label}': {reason}")]
    MalformedDetection { label: String, reason: String },

    /// The detector call completed with an error. The loop stops re-issuing requests.
    #[error("detector failure: {0}")]
    DetectorFailure(String),

    /// A renderer's mount point is absent. That render pass is skipped.
    #[error("render target '{0}' is missing")]
    MissingRenderTarget(&'static str),
}

impl PipelineError {
    pub(crate) fn malformed(label: &str, reason: impl Into<String>) -> Self {
        Self::MalformedDetection {
            label: label.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn detector(err: impl std::fmt::Display) -> Self {
        Self::DetectorFailure(err.to_string())
    }
}
