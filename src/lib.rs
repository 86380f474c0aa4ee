//! live-overlay: live camera detection-to-visualization pipeline.
//!
//! Frames come from a `FrameSource`, a `DetectorBackend` finds objects in them, and
//! each completed detection cycle is normalized into a `DetectionSet` that the
//! overlay, table and chart renderers all read from.
//!
//! - `ingest`: camera sources
//! - `detect`: detector backends and the backend registry
//! - `record`: normalization into renderer-ready records
//! - `pipeline`: session state, the detection loop and the display driver
//! - `render`: overlay, table, chart and log consumers
//! - `control`: start/stop/toggle/reset commands
//! - `config`: file and environment configuration for `overlayd`

pub mod config;
pub mod control;
pub mod detect;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod pipeline;
pub mod record;
pub mod render;
pub mod ui;

pub use config::{DetectorSettings, OverlayConfig};
pub use control::ControlCommand;
#[cfg(feature = "backend-tract")]
pub use detect::TractBackend;
pub use detect::{
    BackendRegistry, CpuBackend, DetectorBackend, RawDetection, ScriptedBackend, SharedBackend,
};
pub use error::PipelineError;
pub use frame::{share_source, Frame, FrameDimensions, FrameSource, SharedSource};
pub use ingest::{CameraConfig, CameraSource, CameraStats};
pub use pipeline::{AsyncDetector, DetectionLoop, Display, LoopState, LoopStats, Session};
pub use record::{normalize, normalize_batch, DetectionRecord, DetectionSet, NormalizedBox};
pub use render::{
    fan_out, ChartHandle, ChartRenderer, CommandSurface, DetectionConsumer, DetectionLogSink,
    MarkupSlot, OverlayRenderer, OverlayStyle, Surface, TableRenderer,
};
