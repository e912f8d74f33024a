//! Frame type representing a captured image with metadata.
//!
//! Pixels are stored interleaved. Two explicit views exist over that
//! storage: the flat view (every sample of every channel as one slice) and
//! the per-plane view (owned single-channel buffers split out in blue,
//! green, red order and merged back in the same order).

use std::time::Instant;

/// Channel layout of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    /// One intensity plane.
    Gray,
    /// Three planes, interleaved as blue, green, red.
    Bgr,
}

impl PixelLayout {
    /// Number of interleaved channels.
    #[inline]
    pub fn channels(self) -> usize {
        match self {
            PixelLayout::Gray => 1,
            PixelLayout::Bgr => 3,
        }
    }
}

/// One single-channel 2D array of intensities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plane {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl Plane {
    /// Wraps one channel of `width * height` samples.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
        }
    }

    /// The samples, row-major.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable samples, row-major.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Plane width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Plane height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }
}

/// A color frame split into its blue, green and red planes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BgrPlanes {
    /// Blue samples.
    pub blue: Plane,
    /// Green samples.
    pub green: Plane,
    /// Red samples.
    pub red: Plane,
}

/// A single captured frame.
#[derive(Clone)]
pub struct Frame {
    /// Interleaved pixel data.
    pixels: Vec<u8>,
    /// Frame width in pixels.
    width: u32,
    /// Frame height in pixels.
    height: u32,
    /// Channel layout.
    layout: PixelLayout,
    /// Capture timestamp.
    timestamp: Instant,
    /// Monotonic sequence number assigned by the source.
    sequence: u64,
}

impl Frame {
    /// Creates a new frame with the given parameters.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, layout: PixelLayout, sequence: u64) -> Self {
        Self {
            pixels,
            width,
            height,
            layout,
            timestamp: Instant::now(),
            sequence,
        }
    }

    /// Creates a black frame.
    pub fn blank(width: u32, height: u32, layout: PixelLayout) -> Self {
        let len = (width as usize) * (height as usize) * layout.channels();
        Self::new(vec![0; len], width, height, layout, 0)
    }

    /// Recombines planes into a BGR frame.
    ///
    /// Returns `None` if the planes differ in size.
    pub fn from_planes(planes: &BgrPlanes, sequence: u64) -> Option<Self> {
        let (width, height) = (planes.blue.width, planes.blue.height);
        let same_size = [&planes.green, &planes.red]
            .iter()
            .all(|p| p.width == width && p.height == height);
        if !same_size || planes.blue.data.len() != (width as usize) * (height as usize) {
            return None;
        }

        let mut frame = Self::blank(width, height, PixelLayout::Bgr);
        frame.sequence = sequence;
        frame.merge_planes(planes);
        Some(frame)
    }

    /// Flat view over every channel of every pixel.
    #[inline]
    pub fn as_flat(&self) -> &[u8] {
        &self.pixels
    }

    /// Mutable flat view over every channel of every pixel.
    #[inline]
    pub fn as_flat_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Copies each channel out into its own plane.
    ///
    /// Returns `None` for gray frames.
    pub fn split_planes(&self) -> Option<BgrPlanes> {
        if self.layout != PixelLayout::Bgr {
            return None;
        }

        let count = self.pixel_count();
        let mut blue = Vec::with_capacity(count);
        let mut green = Vec::with_capacity(count);
        let mut red = Vec::with_capacity(count);
        for px in self.pixels.chunks_exact(3) {
            blue.push(px[0]);
            green.push(px[1]);
            red.push(px[2]);
        }

        Some(BgrPlanes {
            blue: Plane::new(blue, self.width, self.height),
            green: Plane::new(green, self.width, self.height),
            red: Plane::new(red, self.width, self.height),
        })
    }

    /// Writes planes back into this frame in blue, green, red order.
    ///
    /// # Panics
    ///
    /// Panics if this frame is not BGR or a plane does not match the frame size.
    pub fn merge_planes(&mut self, planes: &BgrPlanes) {
        assert_eq!(self.layout, PixelLayout::Bgr, "merging planes into a gray frame");
        let count = self.pixel_count();
        for plane in [&planes.blue, &planes.green, &planes.red] {
            assert_eq!(plane.data.len(), count, "plane size does not match frame");
        }

        for (i, px) in self.pixels.chunks_exact_mut(3).enumerate() {
            px[0] = planes.blue.data[i];
            px[1] = planes.green.data[i];
            px[2] = planes.red.data[i];
        }
    }

    /// Returns an independent left-right flipped copy.
    pub fn mirrored(&self) -> Frame {
        let channels = self.layout.channels();
        let row_len = self.width as usize * channels;
        let mut pixels = Vec::with_capacity(self.pixels.len());

        for row in self.pixels.chunks_exact(row_len.max(1)) {
            for px in row.chunks_exact(channels).rev() {
                pixels.extend_from_slice(px);
            }
        }

        Frame {
            pixels,
            width: self.width,
            height: self.height,
            layout: self.layout,
            timestamp: self.timestamp,
            sequence: self.sequence,
        }
    }

    /// Copies pixel data from `other`, which must have the same shape.
    ///
    /// Returns false and leaves `self` unchanged on a shape mismatch.
    pub fn copy_from(&mut self, other: &Frame) -> bool {
        if !self.same_shape(other) || self.pixels.len() != other.pixels.len() {
            return false;
        }
        self.pixels.copy_from_slice(&other.pixels);
        self.timestamp = other.timestamp;
        self.sequence = other.sequence;
        true
    }

    /// True if both frames have the same dimensions and layout.
    pub fn same_shape(&self, other: &Frame) -> bool {
        self.width == other.width && self.height == other.height && self.layout == other.layout
    }

    /// Returns the frame width.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the frame height.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns the channel layout.
    #[inline]
    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    /// Returns the capture timestamp.
    #[inline]
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    /// Returns the sequence number.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns the total number of pixels (width * height).
    #[inline]
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Validates that the pixel buffer size matches dimensions and layout.
    pub fn is_valid(&self) -> bool {
        self.pixels.len() == self.pixel_count() * self.layout.channels()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("layout", &self.layout)
            .field("sequence", &self.sequence)
            .field("pixel_bytes", &self.pixels.len())
            .finish()
    }
}
