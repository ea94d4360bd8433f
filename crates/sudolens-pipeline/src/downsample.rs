//! Scaling the decoded photo into the square working image.
//!
//! The longest side is scaled to `working_resolution` (up or down) with
//! the aspect ratio preserved, then the result is padded with black on
//! the bottom and right to a `working_resolution` square. Every later
//! stage sees the same pixel budget regardless of camera resolution.

use std::fmt;

use image::{RgbImage, imageops};
use serde::{Deserialize, Serialize};

/// Resampling filter used when scaling to the working resolution.
///
/// Ordered from fastest/lowest-quality to slowest/highest-quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResampleFilter {
    /// Nearest-neighbor: fastest, blocky artifacts.
    Nearest,
    /// Bilinear interpolation: fast, decent quality.
    #[default]
    Triangle,
    /// Bicubic (Catmull-Rom): moderate speed, good quality.
    CatmullRom,
    /// Gaussian: moderate speed, smooth output.
    Gaussian,
    /// Lanczos with 3 lobes: slowest, sharpest.
    Lanczos3,
}

impl ResampleFilter {
    /// Convert to the `image` crate's `FilterType`.
    const fn to_image_filter(self) -> imageops::FilterType {
        match self {
            Self::Nearest => imageops::FilterType::Nearest,
            Self::Triangle => imageops::FilterType::Triangle,
            Self::CatmullRom => imageops::FilterType::CatmullRom,
            Self::Gaussian => imageops::FilterType::Gaussian,
            Self::Lanczos3 => imageops::FilterType::Lanczos3,
        }
    }
}

impl fmt::Display for ResampleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nearest => f.write_str("Nearest"),
            Self::Triangle => f.write_str("Triangle"),
            Self::CatmullRom => f.write_str("CatmullRom"),
            Self::Gaussian => f.write_str("Gaussian"),
            Self::Lanczos3 => f.write_str("Lanczos3"),
        }
    }
}

/// Scale `image` so its longest side equals `side`, then pad to a
/// `side`×`side` square with black.
///
/// Returns the working image and the applied scale factor. A `side` of
/// zero returns the image unchanged with scale `1.0`.
#[must_use = "returns the working image"]
pub fn normalize_to_square(image: &RgbImage, side: u32, filter: ResampleFilter) -> (RgbImage, f64) {
    let (w, h) = image.dimensions();
    if side == 0 || w == 0 || h == 0 {
        return (image.clone(), 1.0);
    }

    let long_axis = w.max(h);
    let scale = f64::from(side) / f64::from(long_axis);
    let scaled_w = scaled_length(w, scale, side);
    let scaled_h = scaled_length(h, scale, side);

    let resized = if (scaled_w, scaled_h) == (w, h) {
        image.clone()
    } else {
        imageops::resize(image, scaled_w, scaled_h, filter.to_image_filter())
    };

    if (scaled_w, scaled_h) == (side, side) {
        return (resized, scale);
    }

    let mut canvas = RgbImage::new(side, side);
    imageops::replace(&mut canvas, &resized, 0, 0);
    (canvas, scale)
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn scaled_length(length: u32, scale: f64, side: u32) -> u32 {
    // Rounded and clamped to [1, side].
    ((f64::from(length) * scale).round() as u32).clamp(1, side)
}
