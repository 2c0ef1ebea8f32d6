// SPDX-License-Identifier: GPL-3.0-only

//! Pixel layout and color space conversions

use crate::backends::video::DecodedFrame;
use crate::errors::VideoError;
use image::RgbImage;

/// Convert RGBA data to RGB image (drop alpha channel)
pub fn rgba_to_rgb(rgba_data: &[u8], width: u32, height: u32) -> Result<RgbImage, VideoError> {
    let pixel_count = width as usize * height as usize;
    let expected_size = pixel_count * 4;
    if rgba_data.len() < expected_size {
        return Err(VideoError::Decode(format!(
            "RGBA data too small: expected {}, got {}",
            expected_size,
            rgba_data.len()
        )));
    }

    let rgb_data: Vec<u8> = rgba_data
        .chunks_exact(4)
        .take(pixel_count)
        .flat_map(|rgba| [rgba[0], rgba[1], rgba[2]])
        .collect();

    RgbImage::from_raw(width, height, rgb_data)
        .ok_or_else(|| VideoError::Decode("Failed to create RGB image from converted data".into()))
}

/// Decoded frame as an RGB image
pub fn frame_to_rgb(frame: &DecodedFrame) -> Result<RgbImage, VideoError> {
    rgba_to_rgb(&frame.data, frame.width, frame.height)
}

/// RGB to YCbCr conversion (BT.601, full range)
///
/// Y is in `0.0..=255.0`; Cb and Cr are centred on zero.
#[inline]
pub fn rgb_to_ycbcr(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let cb = (b - y) / 1.772;
    let cr = (r - y) / 1.402;
    (y, cb, cr)
}

/// YCbCr to RGB conversion (BT.601, full range), rounded and clamped
#[inline]
pub fn ycbcr_to_rgb(y: f32, cb: f32, cr: f32) -> [u8; 3] {
    let r = y + 1.402 * cr;
    let b = y + 1.772 * cb;
    let g = (y - 0.299 * r - 0.114 * b) / 0.587;
    [clamp_u8(r as f64), clamp_u8(g as f64), clamp_u8(b as f64)]
}

/// Round to the nearest integer and saturate to `0..=255`
#[inline]
pub fn clamp_u8(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Mean BT.601 luma of an image, 0 for an empty image
pub fn mean_luminance(image: &RgbImage) -> f64 {
    let count = image.width() as u64 * image.height() as u64;
    if count == 0 {
        return 0.0;
    }
    let sum: f64 = image
        .pixels()
        .map(|p| rgb_to_ycbcr(p[0], p[1], p[2]).0 as f64)
        .sum();
    sum / count as f64
}
