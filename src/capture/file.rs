//! File-backed sources: a still image or a video decoded by `ffmpeg`.

use super::source::{FrameSource, SourceError, SourceProperty};
use super::{Frame, PixelLayout};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

/// Replays one image file on every grab.
///
/// Declares an unknown frame rate, so video output from this source waits
/// for the running estimate.
#[derive(Debug)]
pub struct StillImageSource {
    image: Frame,
    sequence: u64,
    latched: bool,
}

impl StillImageSource {
    /// Loads `path`; color images become BGR frames, others gray.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SourceError::NotFound(path.display().to_string()));
        }
        let decoded = image::open(path)
            .map_err(|e| SourceError::OpenFailed(format!("{}: {e}", path.display())))?;

        let (width, height) = (decoded.width(), decoded.height());
        let image = if decoded.color().has_color() {
            let mut pixels = decoded.to_rgb8().into_raw();
            for px in pixels.chunks_exact_mut(3) {
                px.swap(0, 2);
            }
            Frame::new(pixels, width, height, PixelLayout::Bgr, 0)
        } else {
            Frame::new(decoded.to_luma8().into_raw(), width, height, PixelLayout::Gray, 0)
        };

        tracing::info!(path = %path.display(), width, height, "Still image source opened");
        Ok(Self::from_frame(image))
    }

    /// Replays an in-memory frame.
    pub fn from_frame(image: Frame) -> Self {
        Self {
            image,
            sequence: 0,
            latched: false,
        }
    }
}

impl FrameSource for StillImageSource {
    fn grab(&mut self) -> bool {
        self.sequence += 1;
        self.latched = true;
        true
    }

    fn decode(&mut self, channel: usize) -> Option<Frame> {
        if !self.latched || channel != 0 {
            return None;
        }
        Some(Frame::new(
            self.image.as_flat().to_vec(),
            self.image.width(),
            self.image.height(),
            self.image.layout(),
            self.sequence,
        ))
    }

    fn property(&self, property: SourceProperty) -> f64 {
        match property {
            SourceProperty::FrameWidth => f64::from(self.image.width()),
            SourceProperty::FrameHeight => f64::from(self.image.height()),
            SourceProperty::FrameRate => 0.0,
        }
    }
}

/// Stream parameters reported by `ffprobe`.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Average frame rate, 0.0 if the container does not say.
    pub fps: f64,
}

/// Reads the first video stream's size and rate with `ffprobe`.
pub fn read_video_info(path: &Path) -> Result<VideoInfo, SourceError> {
    #[derive(serde::Deserialize)]
    struct StreamEntry {
        codec_type: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        r_frame_rate: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct StreamList {
        streams: Vec<StreamEntry>,
    }

    let out = Command::new("ffprobe")
        .args(["-v", "error", "-print_format", "json", "-show_streams"])
        .arg(path)
        .output()
        .map_err(|e| SourceError::OpenFailed(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(SourceError::OpenFailed(format!(
            "ffprobe failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: StreamList = serde_json::from_slice(&out.stdout)
        .map_err(|e| SourceError::OpenFailed(format!("ffprobe json parse failed: {e}")))?;
    let stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| SourceError::OpenFailed("no video stream found".into()))?;

    match (stream.width, stream.height) {
        (Some(width), Some(height)) if width > 0 && height > 0 => Ok(VideoInfo {
            width,
            height,
            fps: stream
                .r_frame_rate
                .as_deref()
                .and_then(parse_rate)
                .unwrap_or(0.0),
        }),
        _ => Err(SourceError::OpenFailed(
            "missing video dimensions from ffprobe".into(),
        )),
    }
}

/// Parses `"30000/1001"` or `"25"`. Returns `None` for a zero denominator.
fn parse_rate(s: &str) -> Option<f64> {
    match s.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            (den != 0.0).then(|| num / den)
        }
        None => s.trim().parse().ok(),
    }
}

/// Streams decoded BGR frames out of a video file.
///
/// `grab` reads one frame's worth of bytes from the decoder pipe; `decode`
/// only wraps them in a [`Frame`].
pub struct VideoFileSource {
    path: PathBuf,
    info: VideoInfo,
    child: Child,
    stdout: ChildStdout,
    buffer: Vec<u8>,
    sequence: u64,
    latched: bool,
}

impl VideoFileSource {
    /// Reads stream info for `path` and starts decoding it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SourceError::NotFound(path.display().to_string()));
        }
        let info = read_video_info(path)?;

        let mut child = Command::new("ffmpeg")
            .args(["-v", "error", "-i"])
            .arg(path)
            .args(["-f", "rawvideo", "-pix_fmt", "bgr24", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                SourceError::OpenFailed(format!(
                    "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
                ))
            })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SourceError::OpenFailed("failed to open ffmpeg stdout".into()))?;

        tracing::info!(
            path = %path.display(),
            width = info.width,
            height = info.height,
            fps = info.fps,
            "Video file source opened"
        );

        Ok(Self {
            path: path.to_path_buf(),
            buffer: vec![0; info.width as usize * info.height as usize * 3],
            info,
            child,
            stdout,
            sequence: 0,
            latched: false,
        })
    }

    /// Stream parameters found when opening.
    pub fn info(&self) -> &VideoInfo {
        &self.info
    }
}

impl FrameSource for VideoFileSource {
    fn grab(&mut self) -> bool {
        self.latched = match self.stdout.read_exact(&mut self.buffer) {
            Ok(()) => true,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::UnexpectedEof {
                    tracing::warn!(path = %self.path.display(), error = %e, "Video read failed");
                }
                false
            }
        };
        if self.latched {
            self.sequence += 1;
        }
        self.latched
    }

    fn decode(&mut self, channel: usize) -> Option<Frame> {
        if !self.latched || channel != 0 {
            return None;
        }
        Some(Frame::new(
            self.buffer.clone(),
            self.info.width,
            self.info.height,
            PixelLayout::Bgr,
            self.sequence,
        ))
    }

    fn property(&self, property: SourceProperty) -> f64 {
        match property {
            SourceProperty::FrameWidth => f64::from(self.info.width),
            SourceProperty::FrameHeight => f64::from(self.info.height),
            SourceProperty::FrameRate => self.info.fps,
        }
    }
}

impl Drop for VideoFileSource {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rate() {
        assert_eq!(parse_rate("25/1"), Some(25.0));
        assert_eq!(parse_rate("30"), Some(30.0));
        assert!((parse_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_rate("0/0"), None);
        assert_eq!(parse_rate("abc"), None);
    }

    #[test]
    fn test_still_source_replays_frame() {
        let image = Frame::new(vec![1, 2, 3, 4, 5, 6], 2, 1, PixelLayout::Bgr, 0);
        let mut source = StillImageSource::from_frame(image);

        assert!(source.decode(0).is_none());
        assert!(source.grab());
        let first = source.decode(0).unwrap();
        assert!(source.grab());
        let second = source.decode(0).unwrap();

        assert_eq!(first.as_flat(), second.as_flat());
        assert_eq!(second.sequence(), 2);
        assert!(source.decode(1).is_none());
        assert_eq!(source.property(SourceProperty::FrameRate), 0.0);
        assert_eq!(source.property(SourceProperty::FrameWidth), 2.0);
    }

    #[test]
    fn test_still_source_reads_png_as_bgr() {
        let path = std::env::temp_dir().join(format!(
            "camcurves-still-{}.png",
            std::process::id()
        ));
        // One red pixel, one blue pixel, stored RGB.
        image::save_buffer(&path, &[255, 0, 0, 0, 0, 255], 2, 1, image::ExtendedColorType::Rgb8)
            .unwrap();

        let mut source = StillImageSource::open(&path).unwrap();
        source.grab();
        let frame = source.decode(0).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(frame.layout(), PixelLayout::Bgr);
        assert_eq!(frame.as_flat(), &[0, 0, 255, 255, 0, 0]);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            StillImageSource::open("/definitely/not/here.png"),
            Err(SourceError::NotFound(_))
        ));
        assert!(matches!(
            VideoFileSource::open("/definitely/not/here.avi"),
            Err(SourceError::NotFound(_))
        ));
    }
}
