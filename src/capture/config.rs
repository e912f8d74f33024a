//! Pipeline configuration.
//!
//! Everything is loaded from a single TOML file with `capture`, `filter`
//! and `output` tables. Every field has a default, so an empty file is a
//! valid configuration.

use crate::filters::{ChannelFilter, CurveSet, FilterError, Preset};
use crate::output::FourCc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Highest declared frame rate accepted.
const MAX_FPS: u32 = 240;

/// Where frames come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// Generated gradient, no hardware needed.
    #[default]
    Synthetic,
    /// A still image replayed every frame.
    Image,
    /// A video file decoded by ffmpeg.
    Video,
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "synthetic" => Ok(Self::Synthetic),
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            _ => Err(format!(
                "unknown source '{s}' (expected synthetic, image or video)"
            )),
        }
    }
}

/// Configuration for the capture source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Source kind.
    pub source: SourceKind,
    /// Input file for image and video sources.
    pub input: Option<PathBuf>,
    /// Channel to decode; only multi-head sources use values above 0.
    pub channel: usize,
    /// Frame width in pixels (synthetic source).
    pub width: u32,
    /// Frame height in pixels (synthetic source).
    pub height: u32,
    /// Declared frames per second; 0 means unknown.
    pub fps: u32,
    /// Produce single-plane frames (synthetic source).
    pub grayscale: bool,
    /// Mirror the preview (never the written files).
    pub mirror_preview: bool,
    /// Stop grabbing after this many frames (synthetic source).
    pub frame_limit: Option<u64>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::Synthetic,
            input: None,
            channel: 0,
            width: 640,
            height: 480,
            fps: 30,
            grayscale: false,
            mirror_preview: false,
            frame_limit: None,
        }
    }
}

impl CaptureConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if self.fps > MAX_FPS {
            return Err(ConfigError::InvalidFrameRate);
        }
        if self.source != SourceKind::Synthetic && self.input.is_none() {
            return Err(ConfigError::MissingInput);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Width or height is zero.
    #[error("invalid frame dimensions")]
    InvalidDimensions,
    /// Declared frame rate above the supported maximum.
    #[error("invalid frame rate (must be 0-240 fps, 0 for unknown)")]
    InvalidFrameRate,
    /// An image or video source without an input path.
    #[error("image and video sources need an input path")]
    MissingInput,
    /// The configuration file could not be read.
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    /// The configuration file is not valid TOML for this schema.
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// Source settings.
    #[serde(default)]
    pub capture: CaptureConfig,
    /// Color transform settings.
    #[serde(default)]
    pub filter: FilterConfig,
    /// Output paths and run length.
    #[serde(default)]
    pub output: OutputConfig,
}

/// Which color transform runs on each frame.
///
/// Explicit `curves` take precedence over `preset`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Named curve preset.
    pub preset: Option<Preset>,
    /// Explicit control points.
    pub curves: Option<CurveSet>,
    /// Apply the red/cyan recolor after the curves.
    pub recolor_rc: bool,
}

impl FilterConfig {
    /// Builds the configured curve filter, if any.
    pub fn build(&self) -> Result<Option<ChannelFilter>, FilterError> {
        match (&self.curves, self.preset) {
            // A lone value curve also works on gray frames.
            (Some(curves), _)
                if curves.blue.is_empty() && curves.green.is_empty() && curves.red.is_empty() =>
            {
                ChannelFilter::value(&curves.value).map(Some)
            }
            (Some(curves), _) => ChannelFilter::bgr(curves).map(Some),
            (None, Some(preset)) => preset.filter().map(Some),
            (None, None) => Ok(None),
        }
    }
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Still image target. `{timestamp}` is replaced at write time.
    pub screenshot_path: PathBuf,
    /// Video target.
    pub screencast_path: PathBuf,
    /// Video codec four-character code.
    pub codec: FourCc,
    /// Run continuously (true) or process a fixed number of frames (false).
    pub continuous: bool,
    /// Number of cycles to run if not continuous.
    pub frame_count: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            screenshot_path: PathBuf::from("screenshot.png"),
            screencast_path: PathBuf::from("screencast.flv"),
            codec: FourCc::default(),
            continuous: false,
            frame_count: 100,
        }
    }
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.capture.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::ControlPoint;

    #[test]
    fn test_default_config_valid() {
        let config = CaptureConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_dimensions_invalid() {
        let mut config = CaptureConfig::default();
        config.width = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDimensions)
        ));
    }

    #[test]
    fn test_unknown_fps_allowed() {
        let config = CaptureConfig {
            fps: 0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_file_source_needs_input() {
        let config = CaptureConfig {
            source: SourceKind::Image,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::MissingInput)));
    }

    #[test]
    fn test_empty_file_is_default() {
        let config = FileConfig::from_toml("").unwrap();
        assert_eq!(config.capture.width, 640);
        assert_eq!(config.output.codec, FourCc::default());
        assert!(config.filter.build().unwrap().is_none());
    }

    #[test]
    fn test_parse_full_file() {
        let config = FileConfig::from_toml(
            r#"
            [capture]
            source = "synthetic"
            width = 320
            height = 240
            fps = 0
            mirror_preview = true

            [filter]
            preset = "cross-process"

            [filter.curves]
            value = [[0, 0], [128, 150], [255, 255]]

            [output]
            screencast_path = "out.avi"
            codec = "MJPG"
            "#,
        )
        .unwrap();

        assert_eq!(config.capture.width, 320);
        assert_eq!(config.capture.fps, 0);
        assert!(config.capture.mirror_preview);
        assert_eq!(config.filter.preset, Some(Preset::CrossProcess));
        assert_eq!(
            config.filter.curves.as_ref().unwrap().value[1],
            ControlPoint::new(128, 150)
        );
        assert_eq!(config.output.codec.to_string(), "MJPG");
        assert!(config.filter.build().unwrap().is_some());
    }

    #[test]
    fn test_source_kind_from_str() {
        assert_eq!("Video".parse::<SourceKind>(), Ok(SourceKind::Video));
        assert!("camera".parse::<SourceKind>().is_err());
    }

    #[test]
    fn test_parse_error_reported() {
        assert!(matches!(
            FileConfig::from_toml("[capture]\nwidth = \"wide\""),
            Err(ConfigError::ParseError(_))
        ));
    }
}
