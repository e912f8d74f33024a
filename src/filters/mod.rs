//! Curve-based color transforms.
//!
//! Control points become curve functions, curves compose, and composed
//! curves are reduced to lookup tables applied per plane or across every
//! channel at once.
//!
//! ```text
//! points → CurveFunction → compose → LookupTable → ChannelFilter::apply
//! ```

mod channel;
mod curve;
mod lut;
mod presets;
mod recolor;

pub use channel::{ChannelFilter, CurveSet, FilterError};
pub use curve::{
    compose, CompositeFunction, ControlPoint, CubicSpline, CurveError, CurveFunction, LinearCurve,
};
pub use lut::{apply_lookup, apply_lookup_in_place, LookupTable, Sample};
pub use presets::Preset;
pub use recolor::{recolor_rc, recolor_rc_in_place};
