//! Binarization: adaptive threshold for grid lines, Otsu for cell ink.
//!
//! Both thresholds are inverted so that dark ink on light paper becomes
//! foreground (255) on a black background (0), which is what contour
//! tracing and the blank-cell test expect.

use image::{GrayImage, ImageBuffer, Luma};

use crate::blur::gaussian_kernel;

/// Foreground value in binary masks.
pub const FOREGROUND: u8 = 255;

/// Inverse adaptive threshold against a Gaussian-weighted local mean.
///
/// A pixel becomes foreground iff its value is at most the weighted mean
/// of its `block`×`block` neighbourhood minus `offset`. The neighbourhood
/// replicates edge pixels at the image border.
#[must_use = "returns the binary mask"]
pub fn adaptive_threshold_inverse(image: &GrayImage, block: u32, offset: i16) -> GrayImage {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return image.clone();
    }

    let values: ImageBuffer<Luma<f32>, Vec<f32>> =
        ImageBuffer::from_fn(w, h, |x, y| Luma([f32::from(image.get_pixel(x, y).0[0])]));
    let kernel = gaussian_kernel(block, 0.0);
    let mean = imageproc::filter::separable_filter_equal(&values, &kernel);
    let offset = f32::from(offset);

    GrayImage::from_fn(w, h, |x, y| {
        let v = f32::from(image.get_pixel(x, y).0[0]);
        let threshold = (mean.get_pixel(x, y).0[0] - offset).round();
        if v <= threshold {
            Luma([FOREGROUND])
        } else {
            Luma([0])
        }
    })
}

/// Inverse Otsu threshold: pixels at or below the Otsu level become
/// foreground.
#[must_use = "returns the binary mask"]
pub fn otsu_inverse(image: &GrayImage) -> GrayImage {
    if image.width() == 0 || image.height() == 0 {
        return image.clone();
    }
    let level = imageproc::contrast::otsu_level(image);
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if image.get_pixel(x, y).0[0] <= level {
            Luma([FOREGROUND])
        } else {
            Luma([0])
        }
    })
}

/// Fraction of foreground pixels in a binary mask. Empty masks report 0.
#[must_use]
pub fn foreground_ratio(mask: &GrayImage) -> f64 {
    let total = u64::from(mask.width()) * u64::from(mask.height());
    if total == 0 {
        return 0.0;
    }
    let count = foreground_count(mask);
    #[allow(clippy::cast_precision_loss)]
    let ratio = count as f64 / total as f64;
    ratio
}

/// Number of foreground pixels in a binary mask.
#[must_use]
pub fn foreground_count(mask: &GrayImage) -> u64 {
    mask.pixels().map(|p| u64::from(p.0[0] == FOREGROUND)).sum()
}

/// Whether every pixel has the same value.
#[must_use]
pub fn is_uniform(image: &GrayImage) -> bool {
    let mut pixels = image.pixels();
    pixels
        .next()
        .is_none_or(|first| pixels.all(|p| p.0[0] == first.0[0]))
}
