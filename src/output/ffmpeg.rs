//! Video output through the system `ffmpeg` binary.
//!
//! Raw frames are piped to ffmpeg's stdin; the container and encoder come
//! from the requested four-character code. Using the binary avoids native
//! FFmpeg headers at build time.

use super::{FourCc, OutputError, VideoParams, VideoWriter, VideoWriterFactory};
use crate::capture::{Frame, PixelLayout};
use std::io::Write as _;
use std::process::{Child, ChildStdin, Command, Stdio};

/// Returns true if `ffmpeg -version` runs successfully.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// The ffmpeg encoder name for a codec code.
fn encoder_for(codec: FourCc) -> Option<&'static str> {
    let name = match &codec.as_bytes().map(|b| b.to_ascii_uppercase()) {
        b"I420" | b"IYUV" => "rawvideo",
        b"PIM1" => "mpeg1video",
        b"MJPG" => "mjpeg",
        b"THEO" => "libtheora",
        b"FLV1" => "flv",
        b"XVID" | b"DIVX" | b"FMP4" => "mpeg4",
        b"H264" | b"AVC1" | b"X264" => "libx264",
        _ => return None,
    };
    Some(name)
}

fn input_pix_fmt(layout: PixelLayout) -> &'static str {
    match layout {
        PixelLayout::Gray => "gray",
        PixelLayout::Bgr => "bgr24",
    }
}

/// Builds the ffmpeg argument list for `params`.
fn ffmpeg_args(params: &VideoParams, encoder: &str) -> Vec<String> {
    let mut args: Vec<String> = [
        "-y",
        "-loglevel",
        "error",
        "-f",
        "rawvideo",
        "-pix_fmt",
        input_pix_fmt(params.layout),
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    args.extend([
        "-s".to_string(),
        format!("{}x{}", params.width, params.height),
        "-r".to_string(),
        format!("{:.3}", params.fps),
        "-i".to_string(),
        "pipe:0".to_string(),
        "-an".to_string(),
        "-c:v".to_string(),
        encoder.to_string(),
    ]);
    if encoder == "rawvideo" {
        args.extend(["-pix_fmt".to_string(), "yuv420p".to_string()]);
    }
    args.push(params.path.to_string_lossy().into_owned());
    args
}

/// Spawns an [`FfmpegVideoWriter`] per session.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegWriterFactory;

impl FfmpegWriterFactory {
    /// Creates the factory.
    pub fn new() -> Self {
        Self
    }
}

impl VideoWriterFactory for FfmpegWriterFactory {
    fn create(&mut self, params: &VideoParams) -> Result<Box<dyn VideoWriter>, OutputError> {
        Ok(Box::new(FfmpegVideoWriter::spawn(params)?))
    }
}

/// A running ffmpeg encoder fed through its stdin.
///
/// Dropping the writer closes the pipe and waits for ffmpeg to finalize
/// the file with whatever frames it has received.
pub struct FfmpegVideoWriter {
    params: VideoParams,
    child: Child,
    stdin: Option<ChildStdin>,
}

impl FfmpegVideoWriter {
    /// Validates `params` and starts an ffmpeg encoder writing `params.path`.
    pub fn spawn(params: &VideoParams) -> Result<Self, OutputError> {
        if params.width == 0 || params.height == 0 {
            return Err(OutputError::InvalidParameters(
                "width/height must be non-zero".into(),
            ));
        }
        if !(params.fps.is_finite() && params.fps > 0.0) {
            return Err(OutputError::InvalidParameters(format!(
                "frame rate must be positive, got {}",
                params.fps
            )));
        }
        let encoder = encoder_for(params.codec).ok_or(OutputError::UnsupportedCodec(params.codec))?;

        if !is_ffmpeg_on_path() {
            return Err(OutputError::Encoder(
                "ffmpeg is required for video output, but was not found on PATH".into(),
            ));
        }
        if let Some(parent) = params.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut child = Command::new("ffmpeg")
            .args(ffmpeg_args(params, encoder))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                OutputError::Encoder(format!("failed to spawn ffmpeg: {e}"))
            })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| OutputError::Encoder("failed to open ffmpeg stdin".into()))?;

        tracing::info!(
            path = %params.path.display(),
            codec = %params.codec,
            encoder,
            fps = params.fps,
            width = params.width,
            height = params.height,
            "Video writer opened"
        );

        Ok(Self {
            params: params.clone(),
            child,
            stdin: Some(stdin),
        })
    }
}

impl VideoWriter for FfmpegVideoWriter {
    fn write(&mut self, frame: &Frame) -> Result<(), OutputError> {
        if frame.width() != self.params.width
            || frame.height() != self.params.height
            || frame.layout() != self.params.layout
        {
            return Err(OutputError::InvalidParameters(format!(
                "frame size mismatch: got {}x{} {:?}, expected {}x{} {:?}",
                frame.width(),
                frame.height(),
                frame.layout(),
                self.params.width,
                self.params.height,
                self.params.layout
            )));
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(OutputError::Encoder("ffmpeg encoder is already closed".into()));
        };
        stdin.write_all(frame.as_flat())?;
        Ok(())
    }
}

impl Drop for FfmpegVideoWriter {
    fn drop(&mut self) {
        drop(self.stdin.take());
        match self.child.wait() {
            Ok(status) if status.success() => {
                tracing::info!(path = %self.params.path.display(), "Video writer closed");
            }
            Ok(status) => {
                tracing::warn!(path = %self.params.path.display(), %status, "ffmpeg exited with failure");
            }
            Err(e) => {
                tracing::warn!(path = %self.params.path.display(), error = %e, "Failed to wait for ffmpeg");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn params(codec: &str) -> VideoParams {
        VideoParams {
            path: PathBuf::from("out/clip.avi"),
            codec: codec.parse().unwrap(),
            fps: 29.97,
            width: 320,
            height: 240,
            layout: PixelLayout::Bgr,
        }
    }

    #[test]
    fn test_encoder_mapping() {
        assert_eq!(encoder_for(FourCc::MJPG), Some("mjpeg"));
        assert_eq!(encoder_for(FourCc::FLV1), Some("flv"));
        assert_eq!(encoder_for("avc1".parse().unwrap()), Some("libx264"));
        assert_eq!(encoder_for("ZZZZ".parse().unwrap()), None);
    }

    #[test]
    fn test_args_describe_raw_input() {
        let args = ffmpeg_args(&params("MJPG"), "mjpeg");
        let joined = args.join(" ");

        assert!(joined.contains("-f rawvideo -pix_fmt bgr24"));
        assert!(joined.contains("-s 320x240"));
        assert!(joined.contains("-r 29.970"));
        assert!(joined.contains("-c:v mjpeg"));
        assert_eq!(args.last().map(String::as_str), Some("out/clip.avi"));
    }

    #[test]
    fn test_spawn_rejects_bad_parameters() {
        let mut p = params("MJPG");
        p.fps = 0.0;
        assert!(matches!(
            FfmpegVideoWriter::spawn(&p),
            Err(OutputError::InvalidParameters(_))
        ));

        let p = params("ZZZZ");
        assert!(matches!(
            FfmpegVideoWriter::spawn(&p),
            Err(OutputError::UnsupportedCodec(_))
        ));
    }
}
