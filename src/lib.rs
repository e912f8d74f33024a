//! Camera Curves Library
//!
//! A live capture pipeline that runs every frame through curve-based color
//! lookup filters and hands it to a preview, still-image and video output.
//!
//! # Architecture
//!
//! The system follows an explicit data flow:
//!
//! ```text
//! source → CaptureManager ──enter/frame──▶ filters (in place)
//!                 │
//!               exit → preview, still image, video session
//! ```
//!
//! # Design Principles
//!
//! - **Tables, not curves, per pixel**: curves are evaluated once into
//!   lookup tables when a filter is built
//! - **Absent means identity**: a missing curve or table is a no-op, never
//!   an error
//! - **Grab is cheap, decode is lazy**: a frame is decoded at most once per
//!   cycle and only if someone reads it
//! - **Sinks never abort the loop**: write failures are logged and counted
//!
//! # Example
//!
//! ```no_run
//! use camcurves::{
//!     capture::{CaptureConfig, CaptureManager, SyntheticSource},
//!     filters::Preset,
//!     output::FourCc,
//! };
//!
//! let source = SyntheticSource::open(&CaptureConfig::default()).unwrap();
//! let mut manager = CaptureManager::new(source);
//! let filter = Preset::Velvia.filter().unwrap();
//!
//! manager.start_writing_video("screencast.flv", FourCc::FLV1);
//! for _ in 0..60 {
//!     manager.enter_frame();
//!     if let Some(frame) = manager.frame_mut() {
//!         filter.apply_in_place(frame).unwrap();
//!     }
//!     manager.exit_frame();
//! }
//! manager.stop_writing_video();
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod app;
pub mod capture;
pub mod filters;
pub mod metrics;
pub mod output;

// Re-export commonly used types at crate root
pub use app::{App, Command, KeyMap, KeySource, NoKeys, ScriptedKeys};
pub use capture::{CaptureConfig, CaptureManager, FileConfig, Frame, FrameSource, PixelLayout};
pub use filters::{ChannelFilter, ControlPoint, CurveFunction, LookupTable, Preset};
pub use output::{FourCc, VideoSession};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
