//! Prometheus metrics for the capture pipeline.
//!
//! # Metrics Exposed
//!
//! - `camcurves_frames_total` - Cycles that produced a frame
//! - `camcurves_frames_dropped_total` - Cycles where grab or decode failed
//! - `camcurves_fps_estimate` - Running frames-per-second estimate
//! - `camcurves_images_written_total` - Still images written
//! - `camcurves_video_frames_written_total` - Frames written to video
//! - `camcurves_video_active` - Recording armed or writing (1) or stopped (0)
//! - `camcurves_sink_errors_total` - Failed image and video writes
//!
//! # Example
//!
//! ```no_run
//! use camcurves::metrics::{MetricsRegistry, MetricsSnapshot};
//!
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//!
//! let snapshot = MetricsSnapshot {
//!     frames: 120,
//!     frames_dropped: 2,
//!     fps_estimate: Some(29.8),
//!     images_written: 1,
//!     video_frames_written: 100,
//!     video_active: true,
//!     sink_errors: 0,
//! };
//!
//! registry.update(&snapshot);
//! println!("{}", registry.encode().unwrap());
//! ```

mod collector;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};
