//! Frame sources and the per-frame capture lifecycle.
//!
//! A [`FrameSource`] latches frames; the [`CaptureManager`] drives it one
//! enter/exit cycle at a time and hands each frame to the output sinks.

mod config;
mod file;
mod frame;
mod manager;
mod source;

pub use config::{CaptureConfig, ConfigError, FileConfig, FilterConfig, OutputConfig, SourceKind};
pub use file::{read_video_info, StillImageSource, VideoFileSource, VideoInfo};
pub use frame::{BgrPlanes, Frame, PixelLayout, Plane};
pub use manager::{CaptureManager, CaptureStats, Clock, FpsEstimator, SystemClock};
pub use source::{FrameSource, SourceError, SourceProperty, SyntheticSource};
