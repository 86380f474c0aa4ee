use crate::error::PipelineError;
use crate::record::DetectionSet;
use crate::render::DetectionConsumer;

/// Logs every published set as pretty JSON at debug level.
#[derive(Default)]
pub struct DetectionLogSink;

impl DetectionConsumer for DetectionLogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    fn consume(&mut self, set: &DetectionSet) -> Result<(), PipelineError> {
        if !log::log_enabled!(log::Level::Debug) {
            return Ok(());
        }
        match serde_json::to_string_pretty(set.records()) {
            Ok(json) => log::debug!("cycle {} detections: {}", set.cycle(), json),
            Err(e) => log::warn!("cycle {} detections not serializable: {}", set.cycle(), e),
        }
        Ok(())
    }
}
