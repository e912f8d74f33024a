//! Per-channel curve filters.
//!
//! A filter owns its lookup tables, built once at construction. Applying it
//! to a frame is a table lookup per sample.

use super::curve::{compose, ControlPoint, CurveError, CurveFunction};
use super::lut::{apply_lookup_in_place, LookupTable};
use crate::capture::{Frame, PixelLayout};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from building or applying a filter.
#[derive(Debug, Error)]
pub enum FilterError {
    /// A channel's control points do not form a curve.
    #[error("invalid {channel} curve: {source}")]
    Curve {
        /// Channel name: value, blue, green or red.
        channel: &'static str,
        /// Why the curve was rejected.
        #[source]
        source: CurveError,
    },
    /// The frame layout does not match the filter.
    #[error("filter expects a {expected:?} frame, got {actual:?}")]
    LayoutMismatch {
        /// Layout the filter was built for.
        expected: PixelLayout,
        /// Layout of the frame passed in.
        actual: PixelLayout,
    },
    /// Source and destination frames differ in size or layout.
    #[error("source and destination frames differ in shape")]
    ShapeMismatch,
}

/// Control points for a value curve plus one curve per color channel.
///
/// An empty (or single-point) list means "no curve" for that channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveSet {
    /// Applied to every channel, beneath the per-channel curves.
    pub value: Vec<ControlPoint>,
    /// Blue channel curve.
    pub blue: Vec<ControlPoint>,
    /// Green channel curve.
    pub green: Vec<ControlPoint>,
    /// Red channel curve.
    pub red: Vec<ControlPoint>,
}

fn build_curve(channel: &'static str, points: &[ControlPoint]) -> Result<Option<CurveFunction>, FilterError> {
    CurveFunction::build(points).map_err(|source| FilterError::Curve { channel, source })
}

/// Applies lookup tables to the channels of a frame.
#[derive(Debug, Clone)]
pub enum ChannelFilter {
    /// One table applied uniformly to every sample, gray or color.
    Value { table: Option<LookupTable> },
    /// Independent tables for the blue, green and red planes.
    Bgr {
        blue: Option<LookupTable>,
        green: Option<LookupTable>,
        red: Option<LookupTable>,
    },
}

impl ChannelFilter {
    /// A filter applying one curve to the value of a gray frame or to all
    /// channels of a color frame.
    pub fn value(points: &[ControlPoint]) -> Result<Self, FilterError> {
        Ok(Self::from_value_function(build_curve("value", points)?))
    }

    /// A value filter from an already built curve; `None` is the identity.
    pub fn from_value_function(function: Option<CurveFunction>) -> Self {
        ChannelFilter::Value {
            table: LookupTable::build(function.as_ref()),
        }
    }

    /// A filter with per-channel curves, each layered over the shared
    /// value curve.
    pub fn bgr(curves: &CurveSet) -> Result<Self, FilterError> {
        Ok(Self::from_functions(
            build_curve("value", &curves.value)?,
            build_curve("blue", &curves.blue)?,
            build_curve("green", &curves.green)?,
            build_curve("red", &curves.red)?,
        ))
    }

    /// Builds per-channel tables from `channel(value(x))`.
    pub fn from_functions(
        value: Option<CurveFunction>,
        blue: Option<CurveFunction>,
        green: Option<CurveFunction>,
        red: Option<CurveFunction>,
    ) -> Self {
        let table = |channel: Option<CurveFunction>| {
            LookupTable::build(compose(channel, value.clone()).as_ref())
        };
        ChannelFilter::Bgr {
            blue: table(blue),
            green: table(green),
            red: table(red),
        }
    }

    /// True if applying this filter changes nothing.
    pub fn is_identity(&self) -> bool {
        match self {
            ChannelFilter::Value { table } => table.is_none(),
            ChannelFilter::Bgr { blue, green, red } => {
                blue.is_none() && green.is_none() && red.is_none()
            }
        }
    }

    /// Filters `src` into `dst`.
    ///
    /// `dst` first receives a copy of `src`, so channels without a table
    /// come through unchanged.
    pub fn apply(&self, src: &Frame, dst: &mut Frame) -> Result<(), FilterError> {
        self.check_layout(src)?;
        if !dst.copy_from(src) {
            return Err(FilterError::ShapeMismatch);
        }
        self.apply_in_place(dst)
    }

    /// Filters a frame in place.
    pub fn apply_in_place(&self, frame: &mut Frame) -> Result<(), FilterError> {
        self.check_layout(frame)?;

        match self {
            ChannelFilter::Value { table } => {
                apply_lookup_in_place(table.as_ref(), frame.as_flat_mut());
            }
            ChannelFilter::Bgr { blue, green, red } => {
                if self.is_identity() {
                    return Ok(());
                }
                let Some(mut planes) = frame.split_planes() else {
                    return Err(FilterError::LayoutMismatch {
                        expected: PixelLayout::Bgr,
                        actual: frame.layout(),
                    });
                };
                apply_lookup_in_place(blue.as_ref(), planes.blue.data_mut());
                apply_lookup_in_place(green.as_ref(), planes.green.data_mut());
                apply_lookup_in_place(red.as_ref(), planes.red.data_mut());
                frame.merge_planes(&planes);
            }
        }
        Ok(())
    }

    fn check_layout(&self, frame: &Frame) -> Result<(), FilterError> {
        match self {
            ChannelFilter::Bgr { .. } if frame.layout() != PixelLayout::Bgr => {
                Err(FilterError::LayoutMismatch {
                    expected: PixelLayout::Bgr,
                    actual: frame.layout(),
                })
            }
            _ => Ok(()),
        }
    }
}
