//! Frame resizing to the glyph grid and BT.601 luminance.

use crate::geometry::GridDimensions;
use crate::types::RawFrame;
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbImage};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DownscaleError {
    #[error("malformed {width}x{height} frame: expected {expected} bytes, got {actual}")]
    MalformedFrame {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// A frame resized to the glyph grid, with its luminance alongside.
#[derive(Debug, Clone)]
pub struct DownscaledFrame {
    pub color: RgbImage,
    pub luma: GrayImage,
}

impl DownscaledFrame {
    /// Pair a color grid with its derived luminance.
    pub fn from_color(color: RgbImage) -> Self {
        let luma = to_luma(&color);
        Self { color, luma }
    }

    pub fn dimensions(&self) -> GridDimensions {
        GridDimensions {
            cols: self.color.width(),
            rows: self.color.height(),
        }
    }
}

/// Resize a raw frame to exactly `grid` with linear interpolation.
pub fn downscale(frame: &RawFrame, grid: GridDimensions) -> Result<DownscaledFrame, DownscaleError> {
    let source = frame
        .to_rgb_image()
        .ok_or(DownscaleError::MalformedFrame {
            width: frame.width,
            height: frame.height,
            expected: frame.expected_len(),
            actual: frame.data.len(),
        })?;

    let color = imageops::resize(&source, grid.cols, grid.rows, FilterType::Triangle);
    Ok(DownscaledFrame::from_color(color))
}

/// ITU-R BT.601 luma: Y = 0.299 R + 0.587 G + 0.114 B, in integer math.
#[inline]
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    ((299 * r as u32 + 587 * g as u32 + 114 * b as u32) / 1000) as u8
}

/// Per-pixel BT.601 luminance of an RGB image.
pub fn to_luma(color: &RgbImage) -> GrayImage {
    GrayImage::from_fn(color.width(), color.height(), |x, y| {
        let [r, g, b] = color.get_pixel(x, y).0;
        Luma([luminance(r, g, b)])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_frame(width: u32, height: u32) -> RawFrame {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                data.push((x * 255 / width.max(1)) as u8);
                data.push((y * 255 / height.max(1)) as u8);
                data.push(128);
            }
        }
        RawFrame::new(data, width, height)
    }

    #[test]
    fn test_luminance_primaries() {
        assert_eq!(luminance(0, 0, 0), 0);
        assert_eq!(luminance(255, 255, 255), 255);
        assert_eq!(luminance(255, 0, 0), 76);
        assert_eq!(luminance(0, 255, 0), 149);
        assert_eq!(luminance(0, 0, 255), 29);
    }

    #[test]
    fn test_downscale_hits_grid_exactly() {
        let frame = gradient_frame(640, 480);
        let grid = GridDimensions { cols: 100, rows: 38 };
        let scaled = downscale(&frame, grid).unwrap();
        assert_eq!(scaled.color.dimensions(), (100, 38));
        assert_eq!(scaled.luma.dimensions(), (100, 38));
        assert_eq!(scaled.dimensions(), grid);
    }

    #[test]
    fn test_uniform_frame_stays_uniform() {
        let frame = RawFrame::solid(64, 48, [200, 200, 200]);
        let scaled = downscale(&frame, GridDimensions { cols: 10, rows: 4 }).unwrap();
        assert!(scaled.color.pixels().all(|p| p.0 == [200, 200, 200]));
        assert!(scaled.luma.pixels().all(|p| p.0 == [200]));
    }

    #[test]
    fn test_luma_matches_color_grid() {
        let frame = gradient_frame(320, 240);
        let scaled = downscale(&frame, GridDimensions { cols: 40, rows: 15 }).unwrap();
        for (x, y, px) in scaled.color.enumerate_pixels() {
            let [r, g, b] = px.0;
            assert_eq!(scaled.luma.get_pixel(x, y).0[0], luminance(r, g, b));
        }
    }

    #[test]
    fn test_downscale_is_deterministic() {
        let frame = gradient_frame(320, 240);
        let grid = GridDimensions { cols: 100, rows: 38 };
        let a = downscale(&frame, grid).unwrap();
        let b = downscale(&frame, grid).unwrap();
        assert_eq!(a.color, b.color);
        assert_eq!(a.luma, b.luma);
    }

    #[test]
    fn test_malformed_frame_is_rejected() {
        let frame = RawFrame::new(vec![0; 10], 640, 480);
        let err = downscale(&frame, GridDimensions { cols: 100, rows: 38 }).unwrap_err();
        assert_eq!(
            err,
            DownscaleError::MalformedFrame {
                width: 640,
                height: 480,
                expected: 640 * 480 * 3,
                actual: 10,
            }
        );
    }
}
