use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::RawDetection;
use crate::frame::Frame;

const DEFAULT_LUMA_THRESHOLD: u8 = 200;
const DEFAULT_LABEL: &str = "object";

/// CPU backend for bright-region detection.
///
/// Reports one box around every pixel brighter than the threshold. Confidence is the
/// fraction of the box that is actually bright, so a solid object scores 1.0 and a
/// scatter of noise scores low.
pub struct CpuBackend {
    threshold: u8,
    label: String,
    min_confidence: f32,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the luma threshold.
    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold;
        self
    }

    /// Drop boxes scoring below `min_confidence`.
    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_LUMA_THRESHOLD,
            label: DEFAULT_LABEL.to_string(),
            min_confidence: 0.0,
        }
    }
}

impl DetectorBackend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>> {
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        let mut bright = 0u64;

        for y in 0..frame.height() {
            for x in 0..frame.width() {
                let Some([r, g, b]) = frame.pixel(x, y) else {
                    continue;
                };
                if luma(r, g, b) < self.threshold {
                    continue;
                }
                bright += 1;
                bounds = Some(match bounds {
                    None => (x, y, x, y),
                    Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                });
            }
        }

        let Some((x0, y0, x1, y1)) = bounds else {
            return Ok(Vec::new());
        };
        let width = x1 - x0 + 1;
        let height = y1 - y0 + 1;
        let confidence = bright as f32 / (u64::from(width) * u64::from(height)) as f32;
        if confidence < self.min_confidence {
            return Ok(Vec::new());
        }

        Ok(vec![RawDetection::new(
            self.label.clone(),
            confidence.min(1.0),
            x0 as f32,
            y0 as f32,
            width as f32,
            height as f32,
        )])
    }
}

fn luma(r: u8, g: u8, b: u8) -> u8 {
    let y = 0.299_f32 * r as f32 + 0.587_f32 * g as f32 + 0.114_f32 * b as f32;
    y.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameDimensions;

    fn frame_with_square(x0: u32, y0: u32, size: u32) -> Frame {
        let dims = FrameDimensions::new(20, 10).unwrap();
        let mut pixels = vec![0u8; dims.rgb_len().unwrap()];
        for y in y0..y0 + size {
            for x in x0..x0 + size {
                let offset = ((y * 20 + x) * 3) as usize;
                pixels[offset..offset + 3].fill(255);
            }
        }
        Frame::new(1, dims, pixels).unwrap()
    }

    #[test]
    fn cpu_backend_boxes_bright_region() {
        let mut backend = CpuBackend::default();
        let detections = backend.detect(&frame_with_square(3, 2, 4)).unwrap();

        assert_eq!(detections.len(), 1);
        let d = &detections[0];
        assert_eq!(d.label, "object");
        assert_eq!((d.x, d.y, d.width, d.height), (3.0, 2.0, 4.0, 4.0));
        assert_eq!(d.confidence, 1.0);
    }

    #[test]
    fn cpu_backend_reports_nothing_on_dark_frame() {
        let mut backend = CpuBackend::default().with_label("blob");
        let dims = FrameDimensions::new(4, 4).unwrap();
        let frame = Frame::new(1, dims, vec![10u8; 48]).unwrap();
        assert!(backend.detect(&frame).unwrap().is_empty());
    }

    #[test]
    fn cpu_backend_applies_min_confidence() {
        let dims = FrameDimensions::new(10, 10).unwrap();
        let mut pixels = vec![0u8; 300];
        // Two isolated bright pixels at opposite corners: sparse box.
        pixels[0..3].fill(255);
        pixels[297..300].fill(255);
        let frame = Frame::new(1, dims, pixels).unwrap();

        let mut backend = CpuBackend::default().with_min_confidence(0.5);
        assert!(backend.detect(&frame).unwrap().is_empty());

        let mut permissive = CpuBackend::default();
        let detections = permissive.detect(&frame).unwrap();
        assert_eq!(detections.len(), 1);
        assert!((detections[0].confidence - 0.02).abs() < 1e-6);
    }
}
