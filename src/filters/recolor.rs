//! Channel-mixing recolor effects.

use super::channel::FilterError;
use crate::capture::{Frame, PixelLayout};

/// Simulates a red/cyan film: blue and green are both replaced by their
/// average, red is kept.
pub fn recolor_rc(src: &Frame, dst: &mut Frame) -> Result<(), FilterError> {
    for frame in [src, &*dst] {
        if frame.layout() != PixelLayout::Bgr {
            return Err(FilterError::LayoutMismatch {
                expected: PixelLayout::Bgr,
                actual: frame.layout(),
            });
        }
    }
    if !dst.copy_from(src) {
        return Err(FilterError::ShapeMismatch);
    }
    recolor_rc_in_place(dst)
}

/// In-place variant of [`recolor_rc`].
pub fn recolor_rc_in_place(frame: &mut Frame) -> Result<(), FilterError> {
    if frame.layout() != PixelLayout::Bgr {
        return Err(FilterError::LayoutMismatch {
            expected: PixelLayout::Bgr,
            actual: frame.layout(),
        });
    }

    for px in frame.as_flat_mut().chunks_exact_mut(3) {
        let cyan = ((u16::from(px[0]) + u16::from(px[1]) + 1) / 2) as u8;
        px[0] = cyan;
        px[1] = cyan;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blue_green_averaged() {
        let src = Frame::new(vec![10, 20, 30, 255, 0, 7], 2, 1, PixelLayout::Bgr, 1);
        let mut dst = Frame::blank(2, 1, PixelLayout::Bgr);

        recolor_rc(&src, &mut dst).unwrap();
        assert_eq!(dst.as_flat(), &[15, 15, 30, 128, 128, 7]);
    }

    #[test]
    fn test_gray_rejected() {
        let mut gray = Frame::blank(2, 2, PixelLayout::Gray);
        assert!(recolor_rc_in_place(&mut gray).is_err());
    }
}
