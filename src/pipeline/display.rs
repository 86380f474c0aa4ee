use std::sync::Arc;

use anyhow::{anyhow, Result};

use crate::frame::SharedSource;
use crate::pipeline::{DetectionLoop, Session};
use crate::render::{CommandSurface, OverlayRenderer, Surface};

/// Display refresh driver.
///
/// Called by an external ticker at the camera frame rate, independent of detection
/// cadence. Each refresh captures a frame and draws it with the current overlay.
pub struct Display {
    source: SharedSource,
    session: Arc<Session>,
    overlay: OverlayRenderer,
}

impl Display {
    pub fn new(source: SharedSource, session: Arc<Session>, overlay: OverlayRenderer) -> Self {
        Self {
            source,
            session,
            overlay,
        }
    }

    /// Draw one refresh onto `surface`. Returns the number of boxes drawn.
    pub fn refresh<S: Surface + ?Sized>(&self, surface: &mut S) -> Result<usize> {
        let frame = self
            .source
            .lock()
            .map_err(|_| anyhow!("frame source lock poisoned"))?
            .next_frame()?;
        let set = self.session.current();
        Ok(self
            .overlay
            .draw(surface, &frame, &set, self.session.state()))
    }

    /// Record the last live refresh, then stop `detection`.
    ///
    /// The overlay only draws boxes while Running, so the snapshot has to be taken
    /// before the stop lands.
    pub fn freeze(&self, detection: &DetectionLoop) -> Result<CommandSurface> {
        let mut surface = CommandSurface::new();
        let drawn = self.refresh(&mut surface);
        detection.stop();
        drawn?;
        Ok(surface)
    }
}
