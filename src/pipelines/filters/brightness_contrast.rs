// SPDX-License-Identifier: GPL-3.0-only

//! Linear brightness/contrast around mid-gray

use crate::constants::filters::CONTRAST_PIVOT;
use crate::media::conversions::clamp_u8;
use image::RgbImage;

/// Per-level lookup table for `contrast * (v - 127.5) + 127.5 + brightness`
fn build_lut(brightness: f64, contrast: f64) -> [u8; 256] {
    let mut lut = [0u8; 256];
    for (level, out) in lut.iter_mut().enumerate() {
        *out = clamp_u8(contrast * (level as f64 - CONTRAST_PIVOT) + CONTRAST_PIVOT + brightness);
    }
    lut
}

/// Apply brightness and contrast to every channel
pub fn apply(image: &RgbImage, brightness: f64, contrast: f64) -> RgbImage {
    let lut = build_lut(brightness, contrast);
    let mut output = image.clone();
    for value in output.iter_mut() {
        *value = lut[*value as usize];
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_neutral_parameters_are_identity() {
        let mut image = RgbImage::new(5, 3);
        for (i, p) in image.pixels_mut().enumerate() {
            *p = Rgb([(i * 17) as u8, (i * 31) as u8, 255 - i as u8]);
        }
        assert_eq!(apply(&image, 0.0, 1.0), image);
    }

    #[test]
    fn test_formula_rounds_and_clamps() {
        let image = RgbImage::from_pixel(1, 1, Rgb([240, 120, 60]));
        // 2 * (120 - 127.5) + 127.5 = 112.5 rounds away from zero
        assert_eq!(apply(&image, 0.0, 2.0).get_pixel(0, 0), &Rgb([255, 113, 0]));
        assert_eq!(apply(&image, 20.0, 1.0).get_pixel(0, 0), &Rgb([255, 140, 80]));
    }

    #[test]
    fn test_zero_contrast_flattens_to_mid_gray() {
        let image = RgbImage::from_pixel(2, 2, Rgb([0, 90, 255]));
        let out = apply(&image, 0.0, 0.0);
        assert!(out.pixels().all(|p| p == &Rgb([128, 128, 128])));
    }

    #[test]
    fn test_empty_image_passes_through() {
        assert_eq!(apply(&RgbImage::new(0, 0), 10.0, 2.0).dimensions(), (0, 0));
    }
}
