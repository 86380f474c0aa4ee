//! Bounding-box overlay drawn on every display refresh.
//!
//! The overlay draws the frame, then (only while the loop is Running) one rectangle
//! and one label per record of the current set. Drawing goes through the canvas-like
//! `Surface` trait; `CommandSurface` records commands and can emit SVG.

use serde::{Deserialize, Serialize};

use crate::frame::Frame;
use crate::pipeline::LoopState;
use crate::record::DetectionSet;
use crate::render::escape_html;

pub const DEFAULT_STROKE: &str = "green";
pub const DEFAULT_STROKE_WEIGHT: f32 = 4.0;
pub const DEFAULT_TEXT_FILL: &str = "white";
pub const DEFAULT_TEXT_SIZE: f32 = 24.0;
/// Label position relative to the box's top-left corner.
pub const LABEL_OFFSET: (f32, f32) = (10.0, 24.0);

/// Fixed stroke/fill style of the overlay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverlayStyle {
    pub stroke: String,
    pub stroke_weight: f32,
    pub text_fill: String,
    pub text_size: f32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            stroke: DEFAULT_STROKE.to_string(),
            stroke_weight: DEFAULT_STROKE_WEIGHT,
            text_fill: DEFAULT_TEXT_FILL.to_string(),
            text_size: DEFAULT_TEXT_SIZE,
        }
    }
}

/// Canvas-like drawing target.
pub trait Surface {
    fn draw_frame(&mut self, frame: &Frame);

    /// Unfilled rectangle outline.
    fn stroke_rect(&mut self, x: f32, y: f32, width: f32, height: f32, style: &OverlayStyle);

    fn fill_text(&mut self, text: &str, x: f32, y: f32, style: &OverlayStyle);
}

pub struct OverlayRenderer {
    style: OverlayStyle,
}

impl OverlayRenderer {
    pub fn new(style: OverlayStyle) -> Self {
        Self { style }
    }

    pub fn style(&self) -> &OverlayStyle {
        &self.style
    }

    /// Draw one display refresh. Returns the number of boxes drawn.
    pub fn draw<S: Surface + ?Sized>(
        &self,
        surface: &mut S,
        frame: &Frame,
        set: &DetectionSet,
        state: LoopState,
    ) -> usize {
        surface.draw_frame(frame);
        if state != LoopState::Running {
            return 0;
        }
        for record in set {
            surface.stroke_rect(record.x, record.y, record.width, record.height, &self.style);
            surface.fill_text(
                &record.label,
                record.x + LABEL_OFFSET.0,
                record.y + LABEL_OFFSET.1,
                &self.style,
            );
        }
        set.len()
    }
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new(OverlayStyle::default())
    }
}

// ----------------------------------------------------------------------------
// Recording surface
// ----------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawCommand {
    Frame {
        number: u64,
        width: u32,
        height: u32,
    },
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        stroke: String,
        stroke_weight: f32,
    },
    Text {
        text: String,
        x: f32,
        y: f32,
        fill: String,
        size: f32,
    },
}

/// Surface that records draw commands for one refresh.
#[derive(Clone, Debug, Default)]
pub struct CommandSurface {
    commands: Vec<DrawCommand>,
}

impl CommandSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn box_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Rect { .. }))
            .count()
    }

    /// Render the recorded commands as a standalone SVG document.
    ///
    /// The frame itself is drawn as a dark placeholder rectangle.
    pub fn to_svg(&self) -> String {
        let (width, height) = self
            .commands
            .iter()
            .find_map(|c| match c {
                DrawCommand::Frame { width, height, .. } => Some((*width, *height)),
                _ => None,
            })
            .unwrap_or((0, 0));

        let mut svg = format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">\n",
            w = width,
            h = height
        );
        for command in &self.commands {
            match command {
                DrawCommand::Frame {
                    number,
                    width,
                    height,
                } => svg.push_str(&format!(
                    "  <rect class=\"frame\" data-frame=\"{}\" width=\"{}\" height=\"{}\" fill=\"#101010\"/>\n",
                    number, width, height
                )),
                DrawCommand::Rect {
                    x,
                    y,
                    width,
                    height,
                    stroke,
                    stroke_weight,
                } => svg.push_str(&format!(
                    "  <rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"{}\"/>\n",
                    x,
                    y,
                    width,
                    height,
                    escape_html(stroke),
                    stroke_weight
                )),
                DrawCommand::Text {
                    text,
                    x,
                    y,
                    fill,
                    size,
                } => svg.push_str(&format!(
                    "  <text x=\"{}\" y=\"{}\" fill=\"{}\" font-size=\"{}\">{}</text>\n",
                    x,
                    y,
                    escape_html(fill),
                    size,
                    escape_html(text)
                )),
            }
        }
        svg.push_str("</svg>\n");
        svg
    }
}

impl Surface for CommandSurface {
    fn draw_frame(&mut self, frame: &Frame) {
        self.commands.push(DrawCommand::Frame {
            number: frame.number(),
            width: frame.width(),
            height: frame.height(),
        });
    }

    fn stroke_rect(&mut self, x: f32, y: f32, width: f32, height: f32, style: &OverlayStyle) {
        self.commands.push(DrawCommand::Rect {
            x,
            y,
            width,
            height,
            stroke: style.stroke.clone(),
            stroke_weight: style.stroke_weight,
        });
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, style: &OverlayStyle) {
        self.commands.push(DrawCommand::Text {
            text: text.to_string(),
            x,
            y,
            fill: style.text_fill.clone(),
            size: style.text_size,
        });
    }
}
