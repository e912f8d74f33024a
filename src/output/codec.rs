//! Four-character video codec codes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A four-character codec identifier such as `MJPG` or `FLV1`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FourCc([u8; 4]);

impl FourCc {
    /// Flash video, the default screencast codec.
    pub const FLV1: FourCc = FourCc(*b"FLV1");
    /// Uncompressed planar YUV 4:2:0.
    pub const I420: FourCc = FourCc(*b"I420");
    /// Motion JPEG.
    pub const MJPG: FourCc = FourCc(*b"MJPG");

    /// Wraps four ASCII bytes.
    pub const fn new(code: [u8; 4]) -> Self {
        Self(code)
    }

    /// The raw code.
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl Default for FourCc {
    fn default() -> Self {
        Self::FLV1
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Only constructed from ASCII.
        f.write_str(std::str::from_utf8(&self.0).unwrap_or("????"))
    }
}

impl fmt::Debug for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCc({self})")
    }
}

impl FromStr for FourCc {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 4 || !bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            return Err(format!("codec '{s}' is not a four-character ASCII code"));
        }
        Ok(FourCc([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

impl TryFrom<String> for FourCc {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FourCc> for String {
    fn from(code: FourCc) -> Self {
        code.to_string()
    }
}
