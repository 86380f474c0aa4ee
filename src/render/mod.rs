//! Renderers for published detection sets.
//!
//! Table, chart and log consumers implement `DetectionConsumer` and receive each
//! published `DetectionSet` through `fan_out`. The overlay is driven by the display
//! ticker instead and reads the current set on every refresh.
//!
//! A failing consumer never affects the others: `fan_out` logs the error, skips that
//! consumer for the pass and keeps going.

pub mod chart;
pub mod log_sink;
pub mod overlay;
pub mod table;

pub use chart::{Chart, ChartHandle, ChartRenderer, ChartSeries};
pub use log_sink::DetectionLogSink;
pub use overlay::{CommandSurface, DrawCommand, OverlayRenderer, OverlayStyle, Surface};
pub use table::{render_table, MarkupSlot, TableRenderer, TableRow, PLACEHOLDER_TEXT};

use crate::error::PipelineError;
use crate::record::DetectionSet;

/// Independent consumer of published detection sets.
pub trait DetectionConsumer: Send {
    /// Consumer identifier for diagnostics.
    fn name(&self) -> &'static str;

    /// Render one published set. Must not keep partial state on error.
    fn consume(&mut self, set: &DetectionSet) -> Result<(), PipelineError>;
}

/// Outcome of delivering one set to every consumer.
#[derive(Debug, Default)]
pub struct FanOutReport {
    pub delivered: usize,
    pub failures: Vec<(&'static str, PipelineError)>,
}

/// Deliver `set` to every consumer in registration order.
pub fn fan_out(consumers: &mut [Box<dyn DetectionConsumer>], set: &DetectionSet) -> FanOutReport {
    let mut report = FanOutReport::default();
    for consumer in consumers.iter_mut() {
        match consumer.consume(set) {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                log::warn!(
                    "render pass skipped for '{}' (cycle {}): {}",
                    consumer.name(),
                    set.cycle(),
                    e
                );
                report.failures.push((consumer.name(), e));
            }
        }
    }
    report
}

pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
