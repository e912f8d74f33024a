//! Film-stock emulation presets.
//!
//! A preset is data: a named set of control points. Adding a look means
//! adding a match arm, not a new filter type.

use super::channel::{ChannelFilter, CurveSet, FilterError};
use super::curve::ControlPoint;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Named curve presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    /// Warm, broad highlights and cooler shadows.
    Portra,
    /// Strong contrast, slightly cool throughout.
    Provia,
    /// Deep shadows and vivid colours.
    Velvia,
    /// Blue shadows, yellow highlights, very high contrast.
    CrossProcess,
}

impl Preset {
    /// Every preset, in display order.
    pub const ALL: [Preset; 4] = [
        Preset::Portra,
        Preset::Provia,
        Preset::Velvia,
        Preset::CrossProcess,
    ];

    /// The kebab-case name used in configs and on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Preset::Portra => "portra",
            Preset::Provia => "provia",
            Preset::Velvia => "velvia",
            Preset::CrossProcess => "cross-process",
        }
    }

    /// Control points for this preset.
    pub fn curves(self) -> CurveSet {
        match self {
            Preset::Portra => CurveSet {
                value: points(&[(0, 0), (23, 20), (157, 173), (255, 255)]),
                blue: points(&[(0, 0), (41, 46), (231, 228), (255, 255)]),
                green: points(&[(0, 0), (52, 47), (189, 196), (255, 255)]),
                red: points(&[(0, 0), (69, 69), (213, 218), (255, 255)]),
            },
            Preset::Provia => CurveSet {
                value: Vec::new(),
                blue: points(&[(0, 0), (35, 25), (205, 227), (255, 255)]),
                green: points(&[(0, 0), (27, 21), (196, 207), (255, 255)]),
                red: points(&[(0, 0), (59, 54), (202, 210), (255, 255)]),
            },
            Preset::Velvia => CurveSet {
                value: points(&[(0, 0), (128, 118), (221, 215), (255, 255)]),
                blue: points(&[(0, 0), (25, 21), (122, 153), (165, 206), (255, 255)]),
                green: points(&[(0, 0), (25, 21), (95, 102), (181, 208), (255, 255)]),
                red: points(&[(0, 0), (41, 28), (183, 209), (255, 255)]),
            },
            Preset::CrossProcess => CurveSet {
                value: Vec::new(),
                blue: points(&[(0, 20), (255, 235)]),
                green: points(&[(0, 0), (56, 39), (208, 226), (255, 255)]),
                red: points(&[(0, 0), (56, 22), (211, 255), (255, 255)]),
            },
        }
    }

    /// Builds the per-channel filter for this preset.
    pub fn filter(self) -> Result<ChannelFilter, FilterError> {
        ChannelFilter::bgr(&self.curves())
    }
}

fn points(raw: &[(u16, u16)]) -> Vec<ControlPoint> {
    raw.iter().copied().map(ControlPoint::from).collect()
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Preset::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let names: Vec<&str> = Preset::ALL.iter().map(|p| p.name()).collect();
                format!("unknown preset '{s}' (expected one of: {})", names.join(", "))
            })
    }
}
