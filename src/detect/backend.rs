use anyhow::Result;

use crate::detect::result::RawDetection;
use crate::frame::Frame;

/// Detector backend trait.
///
/// Backends are opaque, blocking capabilities. The pipeline runs them off the
/// cooperative scheduler and delivers the outcome as a single-shot completion, so an
/// implementation may take as long as its model needs.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    ///
    /// Coordinates are absolute pixels in the frame's own dimensions.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
