//! Detection table markup.

use std::sync::{Arc, Mutex};

use crate::error::PipelineError;
use crate::record::{DetectionRecord, DetectionSet};
use crate::render::{escape_html, DetectionConsumer};

/// Text of the single row shown for an empty set.
pub const PLACEHOLDER_TEXT: &str = "No detections yet";

const HEADERS: [&str; 10] = [
    "Label",
    "Confidence",
    "X",
    "Y",
    "Width",
    "Height",
    "Normalized X",
    "Normalized Y",
    "Normalized Width",
    "Normalized Height",
];

/// One row of the table body.
#[derive(Clone, Debug, PartialEq)]
pub enum TableRow {
    Detection([String; 10]),
    Placeholder,
}

impl TableRow {
    fn from_record(record: &DetectionRecord) -> Self {
        let n = &record.normalized;
        TableRow::Detection([
            escape_html(&record.label),
            percent(record.confidence),
            fixed(record.x),
            fixed(record.y),
            fixed(record.width),
            fixed(record.height),
            percent(n.x),
            percent(n.y),
            percent(n.width),
            percent(n.height),
        ])
    }

    fn write_markup(&self, out: &mut String) {
        match self {
            TableRow::Detection(cells) => {
                out.push_str("<tr>");
                for cell in cells {
                    out.push_str("<td>");
                    out.push_str(cell);
                    out.push_str("</td>");
                }
                out.push_str("</tr>");
            }
            TableRow::Placeholder => {
                out.push_str(&format!(
                    "<tr><td colspan=\"{}\">{}</td></tr>",
                    HEADERS.len(),
                    PLACEHOLDER_TEXT
                ));
            }
        }
    }
}

/// Two decimals with ties rounded away from zero (`{:.2}` alone rounds ties to even).
fn two_decimals(value: f64) -> String {
    format!("{:.2}", (value * 100.0).round() / 100.0)
}

fn fixed(value: f32) -> String {
    two_decimals(f64::from(value))
}

fn percent(fraction: f32) -> String {
    format!("{}%", two_decimals(f64::from(fraction) * 100.0))
}

/// Body rows for a set. Never empty: an empty set yields the placeholder row.
pub fn table_rows(set: &DetectionSet) -> Vec<TableRow> {
    if set.is_empty() {
        return vec![TableRow::Placeholder];
    }
    set.iter().map(TableRow::from_record).collect()
}

/// Full table markup for a set.
pub fn render_table(set: &DetectionSet) -> String {
    let mut html = String::from("<table><thead><tr>");
    for header in HEADERS {
        html.push_str("<th>");
        html.push_str(header);
        html.push_str("</th>");
    }
    html.push_str("</tr></thead><tbody>");
    for row in table_rows(set) {
        row.write_markup(&mut html);
    }
    html.push_str("</tbody></table>");
    html
}

// ----------------------------------------------------------------------------
// Mount point
// ----------------------------------------------------------------------------

/// Shared mount point the table markup is written into.
#[derive(Clone, Debug)]
pub struct MarkupSlot {
    inner: Arc<Mutex<String>>,
}

impl MarkupSlot {
    /// A slot pre-filled with the empty-set table.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(render_table(&DetectionSet::empty()))),
        }
    }

    pub fn contents(&self) -> String {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn replace(&self, markup: String) {
        *self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = markup;
    }
}

impl Default for MarkupSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Consumer that re-renders the detection table on every published set.
pub struct TableRenderer {
    target: Option<MarkupSlot>,
    rows_rendered: usize,
}

impl TableRenderer {
    pub fn new(target: MarkupSlot) -> Self {
        Self {
            target: Some(target),
            rows_rendered: 0,
        }
    }

    /// A renderer whose mount point has not been created yet.
    pub fn detached() -> Self {
        Self {
            target: None,
            rows_rendered: 0,
        }
    }

    pub fn attach(&mut self, target: MarkupSlot) {
        self.target = Some(target);
    }

    /// Body rows written by the last successful pass.
    pub fn rows_rendered(&self) -> usize {
        self.rows_rendered
    }
}

impl DetectionConsumer for TableRenderer {
    fn name(&self) -> &'static str {
        "table"
    }

    fn consume(&mut self, set: &DetectionSet) -> Result<(), PipelineError> {
        let target = self
            .target
            .as_ref()
            .ok_or(PipelineError::MissingRenderTarget("detection table"))?;
        let rows = table_rows(set).len();
        target.replace(render_table(set));
        self.rows_rendered = rows;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::RawDetection;
    use crate::frame::FrameDimensions;
    use crate::record::normalize;

    fn set_of(raws: &[RawDetection]) -> DetectionSet {
        let dims = FrameDimensions::new(640, 480).unwrap();
        let records = raws.iter().map(|r| normalize(r, dims).unwrap()).collect();
        DetectionSet::new(1, dims, records)
    }

    fn body_rows(html: &str) -> usize {
        let body = html.split("<tbody>").nth(1).unwrap();
        body.matches("<tr>").count()
    }

    #[test]
    fn empty_set_renders_one_placeholder_row() {
        let html = render_table(&DetectionSet::empty());
        assert_eq!(body_rows(&html), 1);
        assert!(html.contains("<td colspan=\"10\">No detections yet</td>"));
        assert_eq!(table_rows(&DetectionSet::empty()), vec![TableRow::Placeholder]);
    }

    #[test]
    fn formats_cells_like_the_scenario() {
        let set = set_of(&[RawDetection::new("cat", 0.92, 10.0, 20.0, 100.0, 50.0)]);
        let rows = table_rows(&set);
        assert_eq!(rows.len(), 1);
        let TableRow::Detection(cells) = &rows[0] else {
            panic!("expected a detection row");
        };
        assert_eq!(cells[0], "cat");
        assert_eq!(cells[1], "92.00%");
        assert_eq!(cells[2], "10.00");
        assert_eq!(cells[3], "20.00");
        assert_eq!(cells[4], "100.00");
        assert_eq!(cells[5], "50.00");
        assert_eq!(cells[6], "1.56%");
        assert_eq!(cells[7], "4.17%");
        assert_eq!(cells[8], "15.63%");
        assert_eq!(cells[9], "10.42%");
    }

    #[test]
    fn ties_round_away_from_zero() {
        assert_eq!(two_decimals(15.625), "15.63");
        assert_eq!(two_decimals(0.125), "0.13");
        assert_eq!(two_decimals(1.5625), "1.56");
        assert_eq!(percent(0.15625), "15.63%");
        assert_eq!(fixed(0.375), "0.38");

        let set = set_of(&[RawDetection::new("cat", 0.92, 10.0, 20.0, 100.0, 50.0)]);
        let html = render_table(&set);
        assert!(html.contains("<td>1.56%</td><td>4.17%</td><td>15.63%</td><td>10.42%</td>"));
    }

    #[test]
    fn one_row_per_record_and_labels_are_escaped() {
        let set = set_of(&[
            RawDetection::new("<cat>", 0.5, 1.0, 1.0, 1.0, 1.0),
            RawDetection::new("dog", 0.5, 2.0, 2.0, 2.0, 2.0),
        ]);
        let html = render_table(&set);
        assert_eq!(body_rows(&html), 2);
        assert!(html.contains("<td>&lt;cat&gt;</td>"));
        assert!(!html.contains(PLACEHOLDER_TEXT));
    }

    #[test]
    fn detached_renderer_reports_missing_target() {
        let mut renderer = TableRenderer::detached();
        let err = renderer.consume(&DetectionSet::empty()).unwrap_err();
        assert_eq!(err, PipelineError::MissingRenderTarget("detection table"));

        let slot = MarkupSlot::new();
        renderer.attach(slot.clone());
        let set = set_of(&[RawDetection::new("cat", 0.9, 0.0, 0.0, 1.0, 1.0)]);
        renderer.consume(&set).unwrap();
        assert_eq!(renderer.rows_rendered(), 1);
        assert!(slot.contents().contains("<td>cat</td>"));
    }
}
