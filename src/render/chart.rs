//! Live detection chart.
//!
//! `Chart` mirrors a Chart.js bar/line configuration: two line datasets (X and Y
//! coordinates) and one bar dataset (confidence percentage), all indexed by the label
//! sequence. It serializes to the JSON shape Chart.js expects.

use serde::Serialize;
use std::sync::{Arc, Mutex};

use crate::error::PipelineError;
use crate::record::DetectionSet;
use crate::render::DetectionConsumer;

pub const X_DATASET: usize = 0;
pub const Y_DATASET: usize = 1;
pub const CONFIDENCE_DATASET: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    #[serde(rename = "type")]
    pub kind: ChartKind,
    pub label: String,
    pub data: Vec<f32>,
    pub border_color: String,
    pub background_color: String,
    pub border_width: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AxisTitle {
    pub display: bool,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Axis {
    pub begin_at_zero: bool,
    pub title: AxisTitle,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Scales {
    pub x: Axis,
    pub y: Axis,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChartOptions {
    pub scales: Scales,
}

/// Labels plus the three index-aligned series derived from one detection set.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChartSeries {
    pub labels: Vec<String>,
    pub x: Vec<f32>,
    pub y: Vec<f32>,
    pub confidence: Vec<f32>,
}

impl ChartSeries {
    pub fn from_set(set: &DetectionSet) -> Self {
        let mut series = ChartSeries::default();
        for record in set {
            series.labels.push(record.label.clone());
            series.x.push(record.x);
            series.y.push(record.y);
            series.confidence.push(record.confidence * 100.0);
        }
        series
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Chart {
    #[serde(rename = "type")]
    pub kind: ChartKind,
    pub data: ChartData,
    pub options: ChartOptions,
    #[serde(skip)]
    redraws: u64,
}

impl Chart {
    /// Chart with the three detection datasets and no data.
    pub fn new() -> Self {
        let line = |label: &str, rgb: &str| Dataset {
            kind: ChartKind::Line,
            label: label.to_string(),
            data: Vec::new(),
            border_color: format!("rgba({}, 1)", rgb),
            background_color: format!("rgba({}, 0.2)", rgb),
            border_width: 1,
            fill: Some(false),
        };
        let axis = |title: &str| Axis {
            begin_at_zero: true,
            title: AxisTitle {
                display: true,
                text: title.to_string(),
            },
        };
        Self {
            kind: ChartKind::Bar,
            data: ChartData {
                labels: Vec::new(),
                datasets: vec![
                    line("X Coordinates", "75, 192, 192"),
                    line("Y Coordinates", "153, 102, 255"),
                    Dataset {
                        kind: ChartKind::Bar,
                        label: "Confidence".to_string(),
                        data: Vec::new(),
                        border_color: "rgba(255, 159, 64, 1)".to_string(),
                        background_color: "rgba(255, 159, 64, 0.2)".to_string(),
                        border_width: 1,
                        fill: None,
                    },
                ],
            },
            options: ChartOptions {
                scales: Scales {
                    x: axis("Label"),
                    y: axis("Values"),
                },
            },
            redraws: 0,
        }
    }

    /// Replace labels and all three series, then redraw.
    pub fn apply(&mut self, series: ChartSeries) {
        self.data.labels = series.labels;
        self.data.datasets[X_DATASET].data = series.x;
        self.data.datasets[Y_DATASET].data = series.y;
        self.data.datasets[CONFIDENCE_DATASET].data = series.confidence;
        self.redraw();
    }

    /// Current labels and series.
    pub fn series(&self) -> ChartSeries {
        ChartSeries {
            labels: self.data.labels.clone(),
            x: self.data.datasets[X_DATASET].data.clone(),
            y: self.data.datasets[Y_DATASET].data.clone(),
            confidence: self.data.datasets[CONFIDENCE_DATASET].data.clone(),
        }
    }

    /// Number of redraws triggered since creation.
    pub fn redraws(&self) -> u64 {
        self.redraws
    }

    fn redraw(&mut self) {
        self.redraws += 1;
    }
}

impl Default for Chart {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared chart instance, created by the UI glue and read back for export.
#[derive(Clone, Debug)]
pub struct ChartHandle {
    inner: Arc<Mutex<Chart>>,
}

impl ChartHandle {
    pub fn new(chart: Chart) -> Self {
        Self {
            inner: Arc::new(Mutex::new(chart)),
        }
    }

    pub fn snapshot(&self) -> Chart {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.snapshot())
    }

    fn update(&self, series: ChartSeries) {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .apply(series);
    }
}

/// Consumer that pushes each published set into the chart.
///
/// Without a chart handle this is a no-op; it never creates the chart itself.
#[derive(Default)]
pub struct ChartRenderer {
    chart: Option<ChartHandle>,
}

impl ChartRenderer {
    pub fn new(chart: ChartHandle) -> Self {
        Self { chart: Some(chart) }
    }

    pub fn uninitialized() -> Self {
        Self { chart: None }
    }

    pub fn attach(&mut self, chart: ChartHandle) {
        self.chart = Some(chart);
    }
}

impl DetectionConsumer for ChartRenderer {
    fn name(&self) -> &'static str {
        "chart"
    }

    fn consume(&mut self, set: &DetectionSet) -> Result<(), PipelineError> {
        match &self.chart {
            Some(chart) => chart.update(ChartSeries::from_set(set)),
            None => log::debug!("chart not initialized; skipping cycle {}", set.cycle()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::RawDetection;
    use crate::frame::FrameDimensions;
    use crate::record::normalize_batch;

    fn set_of(raws: &[RawDetection]) -> DetectionSet {
        let dims = FrameDimensions::new(640, 480).unwrap();
        let (records, _) = normalize_batch(raws, dims);
        DetectionSet::new(1, dims, records)
    }

    #[test]
    fn replaces_labels_and_series() {
        let handle = ChartHandle::new(Chart::new());
        let mut renderer = ChartRenderer::new(handle.clone());

        let first = set_of(&[
            RawDetection::new("cat", 0.92, 10.0, 20.0, 100.0, 50.0),
            RawDetection::new("dog", 0.5, 30.0, 40.0, 10.0, 10.0),
        ]);
        renderer.consume(&first).unwrap();
        let second = set_of(&[RawDetection::new("bird", 0.25, 1.0, 2.0, 3.0, 4.0)]);
        renderer.consume(&second).unwrap();

        let chart = handle.snapshot();
        let series = chart.series();
        assert_eq!(series.labels, vec!["bird"]);
        assert_eq!(series.x, vec![1.0]);
        assert_eq!(series.y, vec![2.0]);
        assert_eq!(series.confidence, vec![25.0]);
        assert_eq!(chart.redraws(), 2);
    }

    #[test]
    fn uninitialized_chart_is_a_no_op() {
        let mut renderer = ChartRenderer::uninitialized();
        let set = set_of(&[RawDetection::new("cat", 0.9, 1.0, 1.0, 1.0, 1.0)]);
        assert!(renderer.consume(&set).is_ok());
        assert!(renderer.chart.is_none());
    }

    #[test]
    fn serializes_to_chart_js_shape() {
        let handle = ChartHandle::new(Chart::new());
        let json: serde_json::Value = serde_json::from_str(&handle.to_json().unwrap()).unwrap();

        assert_eq!(json["type"], "bar");
        assert_eq!(json["data"]["datasets"][0]["type"], "line");
        assert_eq!(json["data"]["datasets"][0]["label"], "X Coordinates");
        assert_eq!(json["data"]["datasets"][0]["borderColor"], "rgba(75, 192, 192, 1)");
        assert_eq!(json["data"]["datasets"][0]["fill"], false);
        assert_eq!(json["data"]["datasets"][2]["type"], "bar");
        assert!(json["data"]["datasets"][2].get("fill").is_none());
        assert_eq!(json["options"]["scales"]["x"]["title"]["text"], "Label");
        assert_eq!(json["options"]["scales"]["y"]["beginAtZero"], true);
        assert!(json.get("redraws").is_none());
    }
}
