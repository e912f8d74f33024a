//! Frame sinks: preview, still image and video.
//!
//! Only the video session's start/stop logic lives here in full; the sinks
//! themselves are traits, with `image`-crate and `ffmpeg` implementations
//! for the binary.

mod codec;
mod ffmpeg;
mod still;
mod video;

pub use codec::FourCc;
pub use ffmpeg::{is_ffmpeg_on_path, FfmpegVideoWriter, FfmpegWriterFactory};
pub use still::ImageFileWriter;
pub use video::{
    FrameTiming, SessionPhase, VideoSession, VideoTarget, WriteOutcome, FPS_WARMUP_FRAMES,
};

use crate::capture::{Frame, PixelLayout};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by output sinks.
#[derive(Debug, Error)]
pub enum OutputError {
    /// Encoding or saving a still image failed.
    #[error("failed to write image '{path}': {message}")]
    Image {
        /// Target file.
        path: PathBuf,
        /// Encoder message.
        message: String,
    },
    /// No encoder is known for the codec.
    #[error("unsupported codec {0}")]
    UnsupportedCodec(FourCc),
    /// Size, rate or frame shape is unusable.
    #[error("invalid video parameters: {0}")]
    InvalidParameters(String),
    /// The encoder process could not start or failed.
    #[error("video encoder failed: {0}")]
    Encoder(String),
    /// Writing to a file or pipe failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A surface that displays frames.
pub trait PreviewSink {
    /// Shows one frame. Expected to return promptly.
    fn show(&mut self, frame: &Frame);
}

impl<F: FnMut(&Frame)> PreviewSink for F {
    fn show(&mut self, frame: &Frame) {
        self(frame)
    }
}

/// Writes single frames to image files.
pub trait ImageWriter {
    /// Writes `frame` to `path`.
    fn write(&mut self, path: &Path, frame: &Frame) -> Result<(), OutputError>;
}

/// An open video file accepting frames.
pub trait VideoWriter {
    /// Appends one frame.
    fn write(&mut self, frame: &Frame) -> Result<(), OutputError>;
}

/// Everything needed to open a video file.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoParams {
    /// Output file.
    pub path: PathBuf,
    /// Video codec.
    pub codec: FourCc,
    /// Frames per second; must be positive.
    pub fps: f64,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Channel layout of incoming frames.
    pub layout: PixelLayout,
}

/// Opens video writers.
pub trait VideoWriterFactory {
    /// Opens a writer for `params`.
    fn create(&mut self, params: &VideoParams) -> Result<Box<dyn VideoWriter>, OutputError>;
}
