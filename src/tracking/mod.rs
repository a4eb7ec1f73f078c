//! Execution progress: pointer sample log and the sliding-window streaming policy.

pub mod tracker;
pub mod window;

pub use tracker::{PointerLog, PointerSample, PositionTracker, TrackerHandle};
pub use window::{StreamAction, StreamingWindow, WindowConfig};
