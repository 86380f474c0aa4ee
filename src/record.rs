//! Renderer-ready detection records.
//!
//! The normalizer turns a `RawDetection` into a `DetectionRecord` by dividing its
//! absolute geometry by the dimensions of the frame the detector saw. Records are
//! immutable; a `DetectionSet` groups the records of one detection cycle behind an
//! `Arc` so every renderer reads the same version.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::detect::RawDetection;
use crate::error::PipelineError;
use crate::frame::FrameDimensions;

/// Box geometry as fractions of the frame size.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizedBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// One detected object, in absolute pixels plus normalized geometry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub label: String,
    pub confidence: f32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub normalized: NormalizedBox,
}

/// Float rounding in a backend's score math may land just outside `[0, 1]`; scores within
/// this distance of the range are clamped instead of rejected.
pub const CONFIDENCE_SLACK: f32 = 1e-4;

/// Normalize one raw detection against the capture-time frame dimensions.
///
/// Rejects non-finite geometry or confidence, negative box width/height and
/// confidence further than `CONFIDENCE_SLACK` outside `[0, 1]`. Negative `x`/`y` are kept: detectors report boxes
/// clipped at the left or top edge that way.
pub fn normalize(
    raw: &RawDetection,
    frame: FrameDimensions,
) -> Result<DetectionRecord, PipelineError> {
    let fields = [
        ("x", raw.x),
        ("y", raw.y),
        ("width", raw.width),
        ("height", raw.height),
        ("confidence", raw.confidence),
    ];
    if let Some((name, value)) = fields.iter().find(|(_, v)| !v.is_finite()) {
        return Err(PipelineError::malformed(
            &raw.label,
            format!("{} is not finite ({})", name, value),
        ));
    }
    if raw.width < 0.0 || raw.height < 0.0 {
        return Err(PipelineError::malformed(
            &raw.label,
            format!("negative box size {}x{}", raw.width, raw.height),
        ));
    }
    let slack = -CONFIDENCE_SLACK..=1.0 + CONFIDENCE_SLACK;
    if !slack.contains(&raw.confidence) {
        return Err(PipelineError::malformed(
            &raw.label,
            format!("confidence {} outside [0, 1]", raw.confidence),
        ));
    }
    let confidence = raw.confidence.clamp(0.0, 1.0);

    let fw = frame.width() as f32;
    let fh = frame.height() as f32;
    Ok(DetectionRecord {
        label: raw.label.clone(),
        confidence,
        x: raw.x,
        y: raw.y,
        width: raw.width,
        height: raw.height,
        normalized: NormalizedBox {
            x: raw.x / fw,
            y: raw.y / fh,
            width: raw.width / fw,
            height: raw.height / fh,
        },
    })
}

/// Normalize a detector batch, dropping malformed records.
///
/// Returns the surviving records in detector order plus the rejections.
pub fn normalize_batch(
    raws: &[RawDetection],
    frame: FrameDimensions,
) -> (Vec<DetectionRecord>, Vec<PipelineError>) {
    let mut records = Vec::with_capacity(raws.len());
    let mut rejected = Vec::new();
    for raw in raws {
        match normalize(raw, frame) {
            Ok(record) => records.push(record),
            Err(e) => {
                log::warn!("dropping detection: {}", e);
                rejected.push(e);
            }
        }
    }
    (records, rejected)
}

// ----------------------------------------------------------------------------
// DetectionSet
// ----------------------------------------------------------------------------

/// The records of one detection cycle.
///
/// Cloning is cheap and never copies records. Cycle 0 is the empty set a session
/// starts with (and returns to on reset).
#[derive(Clone, Debug)]
pub struct DetectionSet {
    cycle: u64,
    frame: Option<FrameDimensions>,
    records: Arc<[DetectionRecord]>,
}

impl DetectionSet {
    pub fn empty() -> Self {
        Self {
            cycle: 0,
            frame: None,
            records: Arc::from(Vec::new()),
        }
    }

    pub fn new(cycle: u64, frame: FrameDimensions, records: Vec<DetectionRecord>) -> Self {
        Self {
            cycle,
            frame: Some(frame),
            records: records.into(),
        }
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Dimensions of the frame the records were normalized against.
    pub fn frame(&self) -> Option<FrameDimensions> {
        self.frame
    }

    pub fn records(&self) -> &[DetectionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DetectionRecord> {
        self.records.iter()
    }

    /// True when both handles point at the same published records.
    pub fn same_version(&self, other: &DetectionSet) -> bool {
        self.cycle == other.cycle && Arc::ptr_eq(&self.records, &other.records)
    }
}

impl Default for DetectionSet {
    fn default() -> Self {
        Self::empty()
    }
}

impl<'a> IntoIterator for &'a DetectionSet {
    type Item = &'a DetectionRecord;
    type IntoIter = std::slice::Iter<'a, DetectionRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vga() -> FrameDimensions {
        FrameDimensions::new(640, 480).unwrap()
    }

    #[test]
    fn normalizes_against_frame_dimensions() {
        let raw = RawDetection::new("cat", 0.92, 10.0, 20.0, 100.0, 50.0);
        let record = normalize(&raw, vga()).unwrap();

        assert_eq!(record.label, "cat");
        assert_eq!(record.confidence, 0.92);
        assert_eq!(record.normalized.x, 10.0 / 640.0);
        assert_eq!(record.normalized.y, 20.0 / 480.0);
        assert_eq!(record.normalized.width, 100.0 / 640.0);
        assert_eq!(record.normalized.height, 50.0 / 480.0);
        assert!((record.normalized.x - 0.0156).abs() < 1e-4);
        assert!((record.normalized.y - 0.0417).abs() < 1e-4);
        assert!((record.normalized.width - 0.1563).abs() < 1e-4);
        assert!((record.normalized.height - 0.1042).abs() < 1e-4);
    }

    #[test]
    fn in_frame_boxes_normalize_into_unit_range() {
        let dims = vga();
        for (x, y, w, h) in [
            (0.0, 0.0, 640.0, 480.0),
            (639.0, 479.0, 1.0, 1.0),
            (320.0, 0.0, 0.0, 480.0),
            (12.5, 300.25, 200.0, 100.5),
        ] {
            let record = normalize(&RawDetection::new("box", 0.5, x, y, w, h), dims).unwrap();
            let n = record.normalized;
            for v in [n.x, n.y, n.width, n.height] {
                assert!((0.0..=1.0).contains(&v), "{} out of range for {:?}", v, n);
            }
            assert!(n.x + n.width <= 1.0 + f32::EPSILON);
            assert!(n.y + n.height <= 1.0 + f32::EPSILON);
        }
    }

    #[test]
    fn uses_the_dimensions_it_is_given() {
        let raw = RawDetection::new("dog", 0.5, 160.0, 120.0, 32.0, 24.0);
        let small = normalize(&raw, FrameDimensions::new(320, 240).unwrap()).unwrap();
        let large = normalize(&raw, vga()).unwrap();
        assert_eq!(small.normalized.x, 0.5);
        assert_eq!(large.normalized.x, 0.25);
    }

    #[test]
    fn rejects_malformed_geometry() {
        let dims = vga();
        let cases = [
            RawDetection::new("nan", 0.5, f32::NAN, 0.0, 1.0, 1.0),
            RawDetection::new("inf", 0.5, 0.0, 0.0, f32::INFINITY, 1.0),
            RawDetection::new("neg", 0.5, 0.0, 0.0, 10.0, -1.0),
            RawDetection::new("conf", 1.5, 0.0, 0.0, 10.0, 10.0),
            RawDetection::new("conf_nan", f32::NAN, 0.0, 0.0, 10.0, 10.0),
        ];
        for raw in &cases {
            match normalize(raw, dims) {
                Err(PipelineError::MalformedDetection { label, .. }) => {
                    assert_eq!(label, raw.label)
                }
                other => panic!("expected malformed detection, got {:?}", other),
            }
        }
    }

    #[test]
    fn clamps_confidence_rounding_noise() {
        let high = RawDetection::new("cat", 1.000_000_1, 0.0, 0.0, 10.0, 10.0);
        assert_eq!(normalize(&high, vga()).unwrap().confidence, 1.0);

        let low = RawDetection::new("cat", -0.000_01, 0.0, 0.0, 10.0, 10.0);
        assert_eq!(normalize(&low, vga()).unwrap().confidence, 0.0);

        let far = RawDetection::new("cat", 1.01, 0.0, 0.0, 10.0, 10.0);
        assert!(matches!(
            normalize(&far, vga()),
            Err(PipelineError::MalformedDetection { .. })
        ));
    }

    #[test]
    fn accepts_boxes_clipped_at_the_edge() {
        let raw = RawDetection::new("edge", 0.7, -5.0, -2.0, 20.0, 20.0);
        let record = normalize(&raw, vga()).unwrap();
        assert!(record.normalized.x < 0.0);
    }

    #[test]
    fn batch_drops_only_malformed_records() {
        let raws = vec![
            RawDetection::new("cat", 0.9, 1.0, 1.0, 10.0, 10.0),
            RawDetection::new("bad", 0.9, 1.0, 1.0, -10.0, 10.0),
            RawDetection::new("dog", 0.8, 5.0, 5.0, 10.0, 10.0),
        ];
        let (records, rejected) = normalize_batch(&raws, vga());
        let labels: Vec<&str> = records.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["cat", "dog"]);
        assert_eq!(rejected.len(), 1);
    }

    #[test]
    fn detection_set_versions() {
        let set = DetectionSet::new(3, vga(), Vec::new());
        let copy = set.clone();
        assert!(set.same_version(&copy));
        assert!(!set.same_version(&DetectionSet::new(3, vga(), Vec::new())));
        assert!(DetectionSet::empty().is_empty());
        assert_eq!(DetectionSet::empty().cycle(), 0);
    }

    #[test]
    fn record_serializes_with_nested_normalized_box() {
        let raw = RawDetection::new("cat", 0.5, 64.0, 48.0, 64.0, 48.0);
        let record = normalize(&raw, vga()).unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["label"], "cat");
        assert!((json["normalized"]["x"].as_f64().unwrap() - 0.1).abs() < 1e-6);
    }
}
