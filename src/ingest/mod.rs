//! Frame ingestion sources.
//!
//! This module provides sources for live frames:
//! - Synthetic camera (`stub://` URLs) for demos and tests
//!
//! All sources implement `FrameSource` and produce RGB24 `Frame`s whose dimensions are
//! fixed for the lifetime of the source. Real camera acquisition sits behind the same
//! trait and is not part of this crate.

pub mod camera;

pub use camera::{CameraConfig, CameraSource, CameraStats};
