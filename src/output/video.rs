//! Video recording session.
//!
//! ```text
//! Stopped ──start──▶ Armed ──first frame with known rate──▶ Writing
//!    ▲                 │  ▲                                   │
//!    └──────stop───────┘  └─────────────start─────────────────┘
//! ```
//!
//! The writer is created lazily on the first frame for which both the frame
//! size and a trustworthy frame rate are known. Frames seen before that
//! point are dropped, never buffered.

use super::{FourCc, OutputError, VideoParams, VideoWriter, VideoWriterFactory};
use crate::capture::Frame;
use std::path::PathBuf;

/// Frames needed before the running FPS estimate is trusted.
pub const FPS_WARMUP_FRAMES: u64 = 20;

/// Where a session records to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoTarget {
    /// Output file.
    pub path: PathBuf,
    /// Video codec.
    pub codec: FourCc,
}

/// Observable session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Not recording.
    Stopped,
    /// Target set; waiting for a known frame rate.
    Armed,
    /// Writer open.
    Writing,
}

/// Frame-rate information available at the end of a cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTiming {
    /// Rate declared by the source; 0.0 when unknown.
    pub source_fps: f64,
    /// Successful frames so far, including the current one.
    pub frames_elapsed: u64,
    /// Running estimate, once two frames have been seen.
    pub fps_estimate: Option<f64>,
}

impl FrameTiming {
    /// The rate to open a writer with, or `None` to keep waiting.
    pub fn resolve_fps(&self) -> Option<f64> {
        if self.source_fps > 0.0 {
            return Some(self.source_fps);
        }
        if self.frames_elapsed < FPS_WARMUP_FRAMES {
            return None;
        }
        self.fps_estimate.filter(|fps| fps.is_finite() && *fps > 0.0)
    }
}

/// What happened to a frame handed to the session.
#[derive(Debug)]
pub enum WriteOutcome {
    /// No recording requested.
    Idle,
    /// Recording armed but the frame rate is not known yet.
    Deferred,
    /// Frame written.
    Written,
    /// The writer could not be opened or rejected the frame; the session
    /// has been stopped.
    Failed(OutputError),
}

enum State {
    Stopped,
    Armed(VideoTarget),
    Writing {
        target: VideoTarget,
        writer: Box<dyn VideoWriter>,
    },
}

/// Start/stop state machine owning the active video writer.
pub struct VideoSession {
    state: State,
    factory: Box<dyn VideoWriterFactory>,
    frames_written: u64,
}

impl VideoSession {
    /// A stopped session opening writers through `factory`.
    pub fn new(factory: Box<dyn VideoWriterFactory>) -> Self {
        Self {
            state: State::Stopped,
            factory,
            frames_written: 0,
        }
    }

    /// Arms recording to `path`. An active writer is dropped first.
    pub fn start(&mut self, path: impl Into<PathBuf>, codec: FourCc) {
        let target = VideoTarget {
            path: path.into(),
            codec,
        };
        if let State::Writing { target: old, .. } = &self.state {
            tracing::info!(path = %old.path.display(), "Abandoning active recording");
        }
        tracing::info!(path = %target.path.display(), %codec, "Video recording armed");
        // Replacing the state drops any previous writer.
        self.state = State::Armed(target);
        self.frames_written = 0;
    }

    /// Stops recording and releases the writer.
    pub fn stop(&mut self) {
        if let State::Armed(target) | State::Writing { target, .. } = &self.state {
            tracing::info!(
                path = %target.path.display(),
                frames = self.frames_written,
                "Video recording stopped"
            );
        }
        self.state = State::Stopped;
    }

    /// The current phase.
    pub fn phase(&self) -> SessionPhase {
        match self.state {
            State::Stopped => SessionPhase::Stopped,
            State::Armed(_) => SessionPhase::Armed,
            State::Writing { .. } => SessionPhase::Writing,
        }
    }

    /// True while armed or writing.
    pub fn is_active(&self) -> bool {
        !matches!(self.state, State::Stopped)
    }

    /// The armed or active target.
    pub fn target(&self) -> Option<&VideoTarget> {
        match &self.state {
            State::Stopped => None,
            State::Armed(target) | State::Writing { target, .. } => Some(target),
        }
    }

    /// Frames written since the last `start`.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Offers the current frame to the session.
    pub fn on_frame(&mut self, frame: &Frame, timing: &FrameTiming) -> WriteOutcome {
        let state = std::mem::replace(&mut self.state, State::Stopped);

        let (target, mut writer) = match state {
            State::Stopped => return WriteOutcome::Idle,
            State::Writing { target, writer } => (target, writer),
            State::Armed(target) => {
                let Some(fps) = timing.resolve_fps() else {
                    tracing::debug!(
                        frames = timing.frames_elapsed,
                        "Frame rate unknown, deferring video writer"
                    );
                    self.state = State::Armed(target);
                    return WriteOutcome::Deferred;
                };

                let params = VideoParams {
                    path: target.path.clone(),
                    codec: target.codec,
                    fps,
                    width: frame.width(),
                    height: frame.height(),
                    layout: frame.layout(),
                };
                match self.factory.create(&params) {
                    Ok(writer) => (target, writer),
                    Err(e) => {
                        tracing::warn!(path = %target.path.display(), error = %e, "Failed to open video writer");
                        return WriteOutcome::Failed(e);
                    }
                }
            }
        };

        match writer.write(frame) {
            Ok(()) => {
                self.frames_written += 1;
                self.state = State::Writing { target, writer };
                WriteOutcome::Written
            }
            Err(e) => {
                tracing::warn!(path = %target.path.display(), error = %e, "Video frame write failed");
                WriteOutcome::Failed(e)
            }
        }
    }
}

impl std::fmt::Debug for VideoSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoSession")
            .field("phase", &self.phase())
            .field("target", &self.target())
            .field("frames_written", &self.frames_written)
            .finish()
    }
}
