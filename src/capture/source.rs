//! Frame source abstraction.
//!
//! A source separates latching a frame (`grab`) from materializing its
//! pixels (`decode`). Grabbing is cheap and fixes the capture instant for
//! every channel; decoding is done per channel, only when someone reads it.

use super::{CaptureConfig, Frame, PixelLayout};
use thiserror::Error;

/// Errors that can occur while opening a source.
///
/// Per-frame failures are not errors: `grab` returns false and `decode`
/// returns `None`.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The input does not exist.
    #[error("source not found: {0}")]
    NotFound(String),
    /// The input exists but could not be opened or decoded.
    #[error("failed to open source: {0}")]
    OpenFailed(String),
    /// The capture configuration was rejected.
    #[error("invalid source configuration: {0}")]
    ConfigFailed(String),
}

/// Metadata a source can report. Zero means unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceProperty {
    /// Frame width in pixels.
    FrameWidth,
    /// Frame height in pixels.
    FrameHeight,
    /// Declared frames per second.
    FrameRate,
}

/// Trait for capture sources.
///
/// This abstraction allows swapping between real devices, files and
/// synthetic sources for testing.
pub trait FrameSource {
    /// Latches the next frame. Returns false if none is available.
    fn grab(&mut self) -> bool;

    /// Decodes the latched frame for `channel`.
    fn decode(&mut self, channel: usize) -> Option<Frame>;

    /// Reports source metadata; 0.0 when unknown.
    fn property(&self, property: SourceProperty) -> f64;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn grab(&mut self) -> bool {
        (**self).grab()
    }

    fn decode(&mut self, channel: usize) -> Option<Frame> {
        (**self).decode(channel)
    }

    fn property(&self, property: SourceProperty) -> f64 {
        (**self).property(property)
    }
}

/// Synthetic source producing a moving gradient.
///
/// Channel `n` is the same pattern shifted by `n`, so multi-channel reads
/// are distinguishable in tests.
#[derive(Debug)]
pub struct SyntheticSource {
    config: CaptureConfig,
    channels: usize,
    sequence: u64,
    latched: bool,
}

impl SyntheticSource {
    /// Validates `config` and creates a single-channel source.
    pub fn open(config: &CaptureConfig) -> Result<Self, SourceError> {
        config
            .validate()
            .map_err(|e| SourceError::ConfigFailed(e.to_string()))?;
        tracing::info!(
            width = config.width,
            height = config.height,
            fps = config.fps,
            "Synthetic source opened"
        );
        Ok(Self {
            config: config.clone(),
            channels: 1,
            sequence: 0,
            latched: false,
        })
    }

    /// Exposes `channels` decodable channels (at least one).
    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels.max(1);
        self
    }

    fn layout(&self) -> PixelLayout {
        if self.config.grayscale {
            PixelLayout::Gray
        } else {
            PixelLayout::Bgr
        }
    }
}

impl FrameSource for SyntheticSource {
    fn grab(&mut self) -> bool {
        if let Some(limit) = self.config.frame_limit {
            if self.sequence >= limit {
                self.latched = false;
                return false;
            }
        }
        self.sequence += 1;
        self.latched = true;
        true
    }

    fn decode(&mut self, channel: usize) -> Option<Frame> {
        if !self.latched || channel >= self.channels {
            return None;
        }

        let layout = self.layout();
        let (width, height) = (self.config.width as usize, self.config.height as usize);
        let shift = self.sequence as usize + channel;
        let mut pixels = Vec::with_capacity(width * height * layout.channels());

        for y in 0..height {
            for x in 0..width {
                let base = (x + y + shift) % 256;
                match layout {
                    PixelLayout::Gray => pixels.push(base as u8),
                    PixelLayout::Bgr => {
                        pixels.push(base as u8);
                        pixels.push(((x * 255) / width.max(1)) as u8);
                        pixels.push(((y * 255) / height.max(1)) as u8);
                    }
                }
            }
        }

        Some(Frame::new(
            pixels,
            self.config.width,
            self.config.height,
            layout,
            self.sequence,
        ))
    }

    fn property(&self, property: SourceProperty) -> f64 {
        match property {
            SourceProperty::FrameWidth => f64::from(self.config.width),
            SourceProperty::FrameHeight => f64::from(self.config.height),
            SourceProperty::FrameRate => f64::from(self.config.fps),
        }
    }
}
