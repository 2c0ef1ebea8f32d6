// SPDX-License-Identifier: GPL-3.0-only

//! Gray-world automatic white balance

use crate::media::conversions::clamp_u8;
use image::RgbImage;

/// Per-channel gains that move each channel mean to the overall gray mean
pub fn gray_world_gains(image: &RgbImage) -> [f64; 3] {
    let count = image.width() as u64 * image.height() as u64;
    if count == 0 {
        return [1.0; 3];
    }

    let mut sums = [0u64; 3];
    for pixel in image.pixels() {
        for (sum, value) in sums.iter_mut().zip(pixel.0) {
            *sum += value as u64;
        }
    }

    let means = sums.map(|s| s as f64 / count as f64);
    let gray = means.iter().sum::<f64>() / 3.0;
    means.map(|m| if m > 0.0 { gray / m } else { 1.0 })
}

/// Scale each channel by its gray-world gain
pub fn apply(image: &RgbImage) -> RgbImage {
    let gains = gray_world_gains(image);
    if gains == [1.0; 3] {
        return image.clone();
    }

    let luts: [[u8; 256]; 3] = gains.map(|gain| {
        let mut lut = [0u8; 256];
        for (level, out) in lut.iter_mut().enumerate() {
            *out = clamp_u8(level as f64 * gain);
        }
        lut
    });

    let mut output = image.clone();
    for pixel in output.pixels_mut() {
        for (channel, value) in pixel.0.iter_mut().enumerate() {
            *value = luts[channel][*value as usize];
        }
    }
    output
}
