#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::RawDetection;
use crate::frame::Frame;

/// Tract-based backend for SSD-style ONNX object detectors.
///
/// The model takes a `1x3xHxW` float input in `0..1` and produces three outputs:
/// boxes `[1, N, 4]` as normalized `(ymin, xmin, ymax, xmax)`, class indices `[1, N]`,
/// and scores `[1, N]`. Class indices are mapped through a label file with one label
/// per line.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    labels: Vec<String>,
    input_width: u32,
    input_height: u32,
    confidence_threshold: f32,
}

impl TractBackend {
    /// Load an ONNX model and its label file and fix the model input to
    /// `input_width` x `input_height`. Frames of any size are resampled to it.
    pub fn new<P: AsRef<Path>, L: AsRef<Path>>(
        model_path: P,
        labels_path: L,
        input_width: u32,
        input_height: u32,
    ) -> Result<Self> {
        if input_width == 0 || input_height == 0 {
            return Err(anyhow!("model input size must be non-zero"));
        }
        let model_path = model_path.as_ref();
        let labels_path = labels_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, input_height as usize, input_width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        let labels = std::fs::read_to_string(labels_path)
            .with_context(|| format!("failed to read labels from {}", labels_path.display()))?
            .lines()
            .map(|line| line.trim().to_string())
            .collect::<Vec<_>>();
        log::info!(
            "tract model {} loaded ({} labels, input {}x{})",
            model_path.display(),
            labels.len(),
            input_width,
            input_height
        );

        Ok(Self {
            model,
            labels,
            input_width,
            input_height,
            confidence_threshold: 0.5,
        })
    }

    /// Override the default confidence threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Nearest-neighbour resample of the RGB24 frame into a `1x3xHxW` tensor.
    fn build_input(&self, frame: &Frame) -> Tensor {
        let (fw, fh) = (frame.width() as usize, frame.height() as usize);
        let (iw, ih) = (self.input_width as usize, self.input_height as usize);
        let pixels = frame.pixels();
        tract_ndarray::Array4::from_shape_fn((1, 3, ih, iw), |(_, channel, y, x)| {
            let sx = x * fw / iw;
            let sy = y * fh / ih;
            pixels[(sy * fw + sx) * 3 + channel] as f32 / 255.0
        })
        .into_tensor()
    }

    fn label_for(&self, class: f32) -> String {
        let idx = class.round();
        if idx >= 0.0 {
            if let Some(label) = self.labels.get(idx as usize) {
                return label.clone();
            }
        }
        format!("class_{}", idx as i64)
    }

    /// Map normalized model boxes back to absolute pixels of the source frame.
    fn extract_detections(
        &self,
        outputs: TVec<TValue>,
        frame: &Frame,
    ) -> Result<Vec<RawDetection>> {
        if outputs.len() < 3 {
            return Err(anyhow!(
                "model produced {} outputs, expected boxes, classes and scores",
                outputs.len()
            ));
        }
        let boxes = outputs[0]
            .to_array_view::<f32>()
            .context("boxes tensor was not f32")?;
        let classes = outputs[1]
            .to_array_view::<f32>()
            .context("classes tensor was not f32")?;
        let scores = outputs[2]
            .to_array_view::<f32>()
            .context("scores tensor was not f32")?;

        let boxes: Vec<f32> = boxes.iter().copied().collect();
        let classes: Vec<f32> = classes.iter().copied().collect();
        let scores: Vec<f32> = scores.iter().copied().collect();
        if boxes.len() != scores.len() * 4 || classes.len() != scores.len() {
            return Err(anyhow!(
                "model output shapes disagree: {} box values, {} classes, {} scores",
                boxes.len(),
                classes.len(),
                scores.len()
            ));
        }

        let w = frame.width() as f32;
        let h = frame.height() as f32;
        let detections = scores
            .iter()
            .enumerate()
            .filter(|(_, score)| **score >= self.confidence_threshold)
            .map(|(i, score)| {
                let edge = |k: usize| boxes[i * 4 + k].clamp(0.0, 1.0);
                let (ymin, xmin, ymax, xmax) = (edge(0), edge(1), edge(2), edge(3));
                RawDetection::new(
                    self.label_for(classes[i]),
                    *score,
                    xmin * w,
                    ymin * h,
                    (xmax - xmin).max(0.0) * w,
                    (ymax - ymin).max(0.0) * h,
                )
            })
            .collect();
        Ok(detections)
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>> {
        let input = self.build_input(frame);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.extract_detections(outputs, frame)
    }
}
