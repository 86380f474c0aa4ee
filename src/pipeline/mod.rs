//! Detection-to-visualization pipeline.
//!
//! - `Session`: loop state plus the single published `DetectionSet` slot.
//! - `AsyncDetector`: runs a blocking backend as a single-shot async completion.
//! - `DetectionLoop`: start/stop/reset state machine driving one request at a time.
//! - `Display`: per-refresh overlay driver.

mod detection_loop;
mod detector;
mod display;
mod session;

pub use detection_loop::{DetectionLoop, LoopStats};
pub use detector::AsyncDetector;
pub use display::Display;
pub use session::{LoopState, Session};
