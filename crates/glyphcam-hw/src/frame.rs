//! Pixel-format conversion into packed RGB.

use glyphcam_core::types::RawFrame;
use image::ImageFormat;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("invalid frame length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("MJPEG decode failed: {0}")]
    Decode(#[from] image::ImageError),
}

/// Convert packed YUYV (4:2:2) to packed RGB using BT.601 studio-range
/// integer coefficients.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V]; both pixels share the
/// chroma pair.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let pixels = width as usize * height as usize;
    let expected = pixels * 2;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }

    let mut rgb = Vec::with_capacity(pixels * 3);
    let mut pairs = yuyv[..expected].chunks_exact(4);
    for chunk in pairs.by_ref() {
        let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        rgb.extend_from_slice(&ycbcr_to_rgb(y0, u, v));
        rgb.extend_from_slice(&ycbcr_to_rgb(y1, u, v));
    }
    // Odd pixel counts end on a half pair with no V sample.
    if let &[y, u] = pairs.remainder() {
        rgb.extend_from_slice(&ycbcr_to_rgb(y, u, 128));
    }
    Ok(rgb)
}

#[inline]
fn ycbcr_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = 298 * (y as i32 - 16);
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    let clamp = |x: i32| ((x + 128) >> 8).clamp(0, 255) as u8;
    [
        clamp(c + 409 * e),
        clamp(c - 100 * d - 208 * e),
        clamp(c + 516 * d),
    ]
}

/// Copy a packed RGB24 buffer, dropping any driver padding past the image.
pub fn rgb24_from_buffer(buf: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = width as usize * height as usize * 3;
    if buf.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: buf.len(),
        });
    }
    Ok(buf[..expected].to_vec())
}

/// Decode one MJPEG buffer. The JPEG's own dimensions win over the
/// negotiated ones.
pub fn decode_mjpeg(buf: &[u8]) -> Result<(Vec<u8>, u32, u32), FrameError> {
    let rgb = image::load_from_memory_with_format(buf, ImageFormat::Jpeg)?.to_rgb8();
    let (width, height) = rgb.dimensions();
    Ok((rgb.into_raw(), width, height))
}

/// Mirror a frame horizontally (flip left-right) for selfie view.
pub fn mirror_horizontal(frame: &mut RawFrame) {
    let row_len = frame.width as usize * 3;
    if row_len == 0 {
        return;
    }
    let len = frame.expected_len().min(frame.data.len());
    for row in frame.data[..len].chunks_exact_mut(row_len) {
        let width = row.len() / 3;
        for x in 0..width / 2 {
            let (left, right) = (x * 3, (width - 1 - x) * 3);
            for i in 0..3 {
                row.swap(left + i, right + i);
            }
        }
    }
}
