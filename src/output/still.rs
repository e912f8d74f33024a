//! Still-image output via the `image` crate.
//!
//! The file format follows the path's extension.

use super::{ImageWriter, OutputError};
use crate::capture::{Frame, PixelLayout};
use image::ExtendedColorType;
use std::path::Path;

/// Writes frames as PNG, JPEG, BMP or any other format `image` infers
/// from the extension.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageFileWriter;

impl ImageFileWriter {
    /// Creates the writer.
    pub fn new() -> Self {
        Self
    }
}

impl ImageWriter for ImageFileWriter {
    fn write(&mut self, path: &Path, frame: &Frame) -> Result<(), OutputError> {
        let error = |message: String| OutputError::Image {
            path: path.to_path_buf(),
            message,
        };

        if !frame.is_valid() {
            return Err(error("frame buffer does not match its dimensions".into()));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| error(e.to_string()))?;
        }

        let saved = match frame.layout() {
            PixelLayout::Gray => image::save_buffer(
                path,
                frame.as_flat(),
                frame.width(),
                frame.height(),
                ExtendedColorType::L8,
            ),
            PixelLayout::Bgr => {
                // BGR → RGB
                let mut rgb = frame.as_flat().to_vec();
                for px in rgb.chunks_exact_mut(3) {
                    px.swap(0, 2);
                }
                image::save_buffer(
                    path,
                    &rgb,
                    frame.width(),
                    frame.height(),
                    ExtendedColorType::Rgb8,
                )
            }
        };
        saved.map_err(|e| error(e.to_string()))?;

        tracing::debug!(path = %path.display(), sequence = frame.sequence(), "Image written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("camcurves-{}-{name}", std::process::id()))
    }

    #[test]
    fn test_writes_bgr_as_rgb() {
        let path = temp_path("bgr.png");
        let frame = Frame::new(vec![255, 0, 0, 0, 0, 255], 2, 1, PixelLayout::Bgr, 1);

        ImageFileWriter::new().write(&path, &frame).unwrap();
        let read = image::open(&path).unwrap().to_rgb8();
        let _ = std::fs::remove_file(&path);

        // Blue then red.
        assert_eq!(read.get_pixel(0, 0).0, [0, 0, 255]);
        assert_eq!(read.get_pixel(1, 0).0, [255, 0, 0]);
    }

    #[test]
    fn test_writes_gray() {
        let path = temp_path("gray.png");
        let frame = Frame::new(vec![0, 128, 255, 64], 2, 2, PixelLayout::Gray, 1);

        ImageFileWriter::new().write(&path, &frame).unwrap();
        let read = image::open(&path).unwrap().to_luma8();
        let _ = std::fs::remove_file(&path);

        assert_eq!(read.into_raw(), vec![0, 128, 255, 64]);
    }

    #[test]
    fn test_unknown_extension_fails() {
        let path = temp_path("frame.notaformat");
        let frame = Frame::blank(2, 2, PixelLayout::Bgr);

        let err = ImageFileWriter::new().write(&path, &frame).unwrap_err();
        assert!(matches!(err, OutputError::Image { .. }));
    }
}
