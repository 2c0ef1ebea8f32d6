// SPDX-License-Identifier: GPL-3.0-only

//! Contrast-limited adaptive histogram equalization on luma
//!
//! The image is split into a `grid_size` x `grid_size` grid of tiles (fewer
//! when the image is smaller than the grid). Each tile gets its own clipped
//! equalization curve; every pixel blends the curves of the four nearest
//! tile centres. Only BT.601 Y is remapped, Cb and Cr pass through.

use crate::media::conversions::{clamp_u8, rgb_to_ycbcr, ycbcr_to_rgb};
use image::RgbImage;

const BINS: usize = 256;

/// Pixel ranges of `count` tiles over `len` pixels, none of them empty
fn tile_bounds(len: u32, count: u32) -> Vec<(u32, u32)> {
    (0..count)
        .map(|i| {
            let start = (i as u64 * len as u64 / count as u64) as u32;
            let end = ((i as u64 + 1) * len as u64 / count as u64) as u32;
            (start, end)
        })
        .collect()
}

/// Equalization curve for one tile histogram
fn tile_lut(histogram: &mut [u32; BINS], pixels: u32, clip_limit: f64) -> [u8; BINS] {
    let clip = ((clip_limit * pixels as f64 / BINS as f64) as u32).max(1);

    let mut excess = 0u32;
    for bin in histogram.iter_mut() {
        if *bin > clip {
            excess += *bin - clip;
            *bin = clip;
        }
    }

    let per_bin = excess / BINS as u32;
    let residual = (excess % BINS as u32) as usize;
    for bin in histogram.iter_mut() {
        *bin += per_bin;
    }
    if residual > 0 {
        let step = (BINS / residual).max(1);
        for bin in histogram.iter_mut().step_by(step).take(residual) {
            *bin += 1;
        }
    }

    let scale = (BINS - 1) as f64 / pixels as f64;
    let mut lut = [0u8; BINS];
    let mut cumulative = 0u32;
    for (out, count) in lut.iter_mut().zip(histogram.iter()) {
        cumulative += count;
        *out = clamp_u8(cumulative as f64 * scale);
    }
    lut
}

/// Neighbouring tile indices and the weight of the second one
fn neighbours(pos: u32, centres: &[f64]) -> (usize, usize, f32) {
    let p = pos as f64 + 0.5;
    let last = centres.len() - 1;
    if p <= centres[0] {
        return (0, 0, 0.0);
    }
    if p >= centres[last] {
        return (last, last, 0.0);
    }
    // centres are increasing, so the partition point is the upper neighbour
    let upper = centres.partition_point(|&c| c <= p);
    let lower = upper - 1;
    let weight = (p - centres[lower]) / (centres[upper] - centres[lower]);
    (lower, upper, weight as f32)
}

/// Equalize luma with the given clip limit and grid size
pub fn apply(image: &RgbImage, clip_limit: f64, grid_size: u32) -> RgbImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let tiles_x = grid_size.clamp(1, width);
    let tiles_y = grid_size.clamp(1, height);
    let cols = tile_bounds(width, tiles_x);
    let rows = tile_bounds(height, tiles_y);

    let ycbcr: Vec<(f32, f32, f32)> = image
        .pixels()
        .map(|p| rgb_to_ycbcr(p[0], p[1], p[2]))
        .collect();
    let luma: Vec<u8> = ycbcr.iter().map(|&(y, _, _)| clamp_u8(y as f64)).collect();

    let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for &(y0, y1) in &rows {
        for &(x0, x1) in &cols {
            let mut histogram = [0u32; BINS];
            for y in y0..y1 {
                let row = (y * width) as usize;
                for x in x0..x1 {
                    histogram[luma[row + x as usize] as usize] += 1;
                }
            }
            luts.push(tile_lut(&mut histogram, (x1 - x0) * (y1 - y0), clip_limit));
        }
    }

    let centre = |&(a, b): &(u32, u32)| (a + b) as f64 / 2.0;
    let col_centres: Vec<f64> = cols.iter().map(centre).collect();
    let row_centres: Vec<f64> = rows.iter().map(centre).collect();
    let col_weights: Vec<(usize, usize, f32)> =
        (0..width).map(|x| neighbours(x, &col_centres)).collect();

    let mut output = RgbImage::new(width, height);
    for y in 0..height {
        let (ty0, ty1, wy) = neighbours(y, &row_centres);
        for x in 0..width {
            let (tx0, tx1, wx) = col_weights[x as usize];
            let index = (y * width + x) as usize;
            let level = luma[index] as usize;

            let lut_at = |ty: usize, tx: usize| luts[ty * tiles_x as usize + tx][level] as f32;
            let top = lut_at(ty0, tx0) * (1.0 - wx) + lut_at(ty0, tx1) * wx;
            let bottom = lut_at(ty1, tx0) * (1.0 - wx) + lut_at(ty1, tx1) * wx;
            let equalized = top * (1.0 - wy) + bottom * wy;

            let (_, cb, cr) = ycbcr[index];
            output.put_pixel(x, y, image::Rgb(ycbcr_to_rgb(equalized, cb, cr)));
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn two_tone(width: u32, height: u32, left: u8, right: u8) -> RgbImage {
        RgbImage::from_fn(width, height, |x, _| {
            let v = if x < width / 2 { left } else { right };
            Rgb([v, v, v])
        })
    }

    #[test]
    fn test_low_contrast_is_stretched() {
        let image = two_tone(32, 32, 100, 110);
        let out = apply(&image, 40.0, 1);
        let dark = out.get_pixel(0, 0)[0] as i32;
        let light = out.get_pixel(31, 0)[0] as i32;
        assert!(light - dark > 10, "dark {} light {}", dark, light);
    }

    #[test]
    fn test_gray_stays_gray() {
        let image = two_tone(17, 9, 30, 200);
        let out = apply(&image, 4.0, 8);
        for p in out.pixels() {
            assert!((p[0] as i16 - p[1] as i16).abs() <= 1);
            assert!((p[1] as i16 - p[2] as i16).abs() <= 1);
        }
    }

    #[test]
    fn test_odd_and_tiny_sizes_keep_dimensions() {
        for (w, h) in [(1, 1), (3, 7), (65, 2)] {
            let image = RgbImage::from_pixel(w, h, Rgb([200, 40, 90]));
            assert_eq!(apply(&image, 2.0, 8).dimensions(), (w, h));
        }
        assert_eq!(apply(&RgbImage::new(0, 0), 2.0, 8).dimensions(), (0, 0));
    }

    #[test]
    fn test_tile_bounds_cover_without_gaps() {
        let bounds = tile_bounds(9, 4);
        assert_eq!(bounds.first().map(|b| b.0), Some(0));
        assert_eq!(bounds.last().map(|b| b.1), Some(9));
        assert!(bounds.windows(2).all(|w| w[0].1 == w[1].0));
        assert!(bounds.iter().all(|(a, b)| b > a));
    }

    #[test]
    fn test_clipped_histogram_keeps_pixel_count() {
        let mut histogram = [0u32; BINS];
        histogram[100] = 900;
        histogram[101] = 124;
        let lut = tile_lut(&mut histogram, 1024, 2.0);
        assert_eq!(histogram.iter().sum::<u32>(), 1024);
        assert_eq!(lut[255], 255);
        assert!(lut.windows(2).all(|w| w[0] <= w[1]));
    }
}
