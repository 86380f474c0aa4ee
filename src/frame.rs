//! Frames and frame sources.
//!
//! - `FrameDimensions`: validated width/height pair, both non-zero.
//! - `Frame`: one captured RGB24 image. Pixels are shared and read-only.
//! - `FrameSource`: capability that produces frames on demand (camera abstraction).
//!
//! Normalization always uses the dimensions carried by the frame a detection was run
//! on, never a cached session value, so a resized capture stays correct.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Bytes per pixel for the RGB24 frames produced by ingestion sources.
pub const RGB_CHANNELS: usize = 3;

// ----------------------------------------------------------------------------
// FrameDimensions
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameDimensions {
    width: u32,
    height: u32,
}

impl FrameDimensions {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!(
                "frame dimensions must be non-zero (got {}x{})",
                width,
                height
            ));
        }
        Ok(Self { width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Expected RGB24 buffer length for these dimensions.
    pub fn rgb_len(&self) -> Result<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|v| v.checked_mul(RGB_CHANNELS))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))
    }
}

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// One still image captured from the live source.
#[derive(Clone, Debug)]
pub struct Frame {
    number: u64,
    dimensions: FrameDimensions,
    pixels: Arc<[u8]>,
}

impl Frame {
    /// Wrap RGB24 pixels. Fails when the buffer length does not match the dimensions.
    pub fn new(number: u64, dimensions: FrameDimensions, pixels: Vec<u8>) -> Result<Self> {
        let expected = dimensions.rgb_len()?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                pixels.len()
            ));
        }
        Ok(Self {
            number,
            dimensions,
            pixels: pixels.into(),
        })
    }

    /// Monotonic capture counter assigned by the source.
    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn dimensions(&self) -> FrameDimensions {
        self.dimensions
    }

    pub fn width(&self) -> u32 {
        self.dimensions.width
    }

    pub fn height(&self) -> u32 {
        self.dimensions.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// RGB triple at `(x, y)`, or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.dimensions.width || y >= self.dimensions.height {
            return None;
        }
        let idx = (y as usize * self.dimensions.width as usize + x as usize) * RGB_CHANNELS;
        let px = self.pixels.get(idx..idx + RGB_CHANNELS)?;
        Some([px[0], px[1], px[2]])
    }
}

// ----------------------------------------------------------------------------
// FrameSource
// ----------------------------------------------------------------------------

/// Supplies frames on demand. Implemented by ingestion sources.
pub trait FrameSource: Send {
    /// Dimensions of the frames this source currently produces.
    fn dimensions(&self) -> FrameDimensions;

    /// Capture the next frame.
    fn next_frame(&mut self) -> Result<Frame>;

    /// Returns false when the source has lost its feed.
    fn is_healthy(&self) -> bool {
        true
    }
}

/// Frame source shared between the display ticker and the detection loop.
pub type SharedSource = Arc<Mutex<dyn FrameSource>>;

pub fn share_source<S: FrameSource + 'static>(source: S) -> SharedSource {
    Arc::new(Mutex::new(source))
}
