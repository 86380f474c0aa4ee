//! Camera frame source.
//!
//! `CameraSource` dispatches on the configured URL. `stub://` URLs produce a synthetic
//! scene: a dark background with one bright square that sweeps back and forth, which
//! gives the `cpu` backend something to find.

use anyhow::{bail, Result};

use crate::frame::{Frame, FrameDimensions, FrameSource, RGB_CHANNELS};

/// Background luma of the synthetic scene.
pub const SYNTHETIC_BACKGROUND: u8 = 16;
/// Luma of the synthetic moving square.
pub const SYNTHETIC_OBJECT: u8 = 240;

/// Configuration for a camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Source URL (e.g., "stub://front_camera").
    pub url: String,
    /// Display refresh rate (frames per second).
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            url: "stub://camera".to_string(),
            target_fps: 30,
            width: 640,
            height: 480,
        }
    }
}

/// Live camera feed abstraction.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Result<Self> {
        let dimensions = FrameDimensions::new(config.width, config.height)?;
        if config.url.starts_with("stub://") {
            Ok(Self {
                backend: CameraBackend::Synthetic(SyntheticCamera::new(config, dimensions)),
            })
        } else {
            bail!(
                "unsupported camera url '{}': only stub:// sources are built in",
                config.url
            )
        }
    }

    /// Get capture statistics.
    pub fn stats(&self) -> CameraStats {
        match &self.backend {
            CameraBackend::Synthetic(camera) => camera.stats(),
        }
    }
}

impl FrameSource for CameraSource {
    fn dimensions(&self) -> FrameDimensions {
        match &self.backend {
            CameraBackend::Synthetic(camera) => camera.dimensions,
        }
    }

    fn next_frame(&mut self) -> Result<Frame> {
        match &mut self.backend {
            CameraBackend::Synthetic(camera) => camera.next_frame(),
        }
    }
}

/// Statistics for a camera source.
#[derive(Clone, Debug)]
pub struct CameraStats {
    pub frames_captured: u64,
    pub url: String,
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://)
// ----------------------------------------------------------------------------

struct SyntheticCamera {
    config: CameraConfig,
    dimensions: FrameDimensions,
    frame_count: u64,
}

impl SyntheticCamera {
    fn new(config: CameraConfig, dimensions: FrameDimensions) -> Self {
        log::info!(
            "CameraSource: opened {} ({}x{}, synthetic)",
            config.url,
            dimensions.width(),
            dimensions.height()
        );
        Self {
            config,
            dimensions,
            frame_count: 0,
        }
    }

    fn next_frame(&mut self) -> Result<Frame> {
        self.frame_count += 1;
        let pixels = self.generate_synthetic_pixels()?;
        Frame::new(self.frame_count, self.dimensions, pixels)
    }

    /// Side length of the moving square.
    fn object_size(&self) -> u32 {
        (self.dimensions.width().min(self.dimensions.height()) / 5).max(1)
    }

    /// Top-left corner of the square for the current frame. Bounces horizontally.
    fn object_origin(&self) -> (u32, u32) {
        let size = self.object_size();
        let travel = u64::from(self.dimensions.width().saturating_sub(size)).max(1);
        let step = self.frame_count.saturating_mul(4) % (travel * 2);
        let x = if step < travel { step } else { travel * 2 - step };
        let y = (self.dimensions.height().saturating_sub(size)) / 2;
        (x as u32, y)
    }

    fn generate_synthetic_pixels(&self) -> Result<Vec<u8>> {
        let mut pixels = vec![SYNTHETIC_BACKGROUND; self.dimensions.rgb_len()?];
        let size = self.object_size();
        let (ox, oy) = self.object_origin();
        let width = self.dimensions.width() as usize;
        for y in oy..(oy + size).min(self.dimensions.height()) {
            let row = y as usize * width;
            for x in ox..(ox + size).min(self.dimensions.width()) {
                let offset = (row + x as usize) * RGB_CHANNELS;
                pixels[offset..offset + RGB_CHANNELS].fill(SYNTHETIC_OBJECT);
            }
        }
        Ok(pixels)
    }

    fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            url: self.config.url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config() -> CameraConfig {
        CameraConfig {
            url: "stub://test".to_string(),
            target_fps: 10,
            width: 64,
            height: 48,
        }
    }

    #[test]
    fn synthetic_camera_produces_frames() -> Result<()> {
        let mut source = CameraSource::new(stub_config())?;
        let frame = source.next_frame()?;
        assert_eq!(frame.number(), 1);
        assert_eq!(frame.width(), 64);
        assert_eq!(frame.height(), 48);
        assert_eq!(source.stats().frames_captured, 1);
        assert_eq!(source.stats().url, "stub://test");
        Ok(())
    }

    #[test]
    fn synthetic_scene_contains_a_moving_square() -> Result<()> {
        let mut source = CameraSource::new(stub_config())?;
        let first = source.next_frame()?;
        let second = source.next_frame()?;

        let bright = |frame: &Frame| {
            (0..frame.width())
                .find(|&x| frame.pixel(x, 24) == Some([SYNTHETIC_OBJECT; 3]))
                .expect("square crosses the middle row")
        };
        assert_ne!(bright(&first), bright(&second));
        assert_eq!(first.pixel(0, 0), Some([SYNTHETIC_BACKGROUND; 3]));
        Ok(())
    }

    #[test]
    fn non_stub_urls_are_rejected() {
        let config = CameraConfig {
            url: "rtsp://camera-1".to_string(),
            ..stub_config()
        };
        assert!(CameraSource::new(config).is_err());
    }
}
