use image::RgbImage;
use std::fmt;
use std::time::Instant;

/// A captured color camera frame.
///
/// Owned by the loop iteration that read it and never mutated after capture.
#[derive(Clone)]
pub struct RawFrame {
    /// Packed RGB pixel data (width * height * 3 bytes), row-major.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
    pub sequence: u32,
}

impl RawFrame {
    /// Wrap packed RGB bytes captured just now.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp: Instant::now(),
            sequence: 0,
        }
    }

    /// A frame where every pixel has the same color.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self::new(data, width, height)
    }

    /// Number of bytes a well-formed frame of this size carries.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    /// Copy the pixels into an `image` buffer.
    ///
    /// Returns `None` when the frame is empty or its buffer is shorter than
    /// its dimensions claim.
    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        let expected = self.expected_len();
        if expected == 0 || self.data.len() < expected {
            return None;
        }
        RgbImage::from_raw(self.width, self.height, self.data[..expected].to_vec())
    }
}

impl fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .field("bytes", &self.data.len())
            .finish_non_exhaustive()
    }
}

/// Axis-aligned face bounding box in glyph-grid coordinates.
///
/// `x`/`y` may be negative when a detector places a box partly off-grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl FaceBox {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}
