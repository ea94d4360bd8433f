//! Image decoding.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces a
//! three-channel colour image. Grayscale conversion happens later, after
//! the photo has been brought to the working resolution.
//!
//! This is the first step in the pipeline: raw bytes in, `RgbImage` out.

use image::{GrayImage, RgbImage};

use crate::types::PipelineError;

/// Decode raw image bytes into an RGB raster.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
/// Returns [`PipelineError::EmptyImage`] if the image has zero width or
/// height.
#[must_use = "returns the decoded image"]
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    if img.width() == 0 || img.height() == 0 {
        return Err(PipelineError::EmptyImage);
    }
    Ok(img.to_rgb8())
}

/// Convert an RGB image to single-channel luminance
/// (`0.299*R + 0.587*G + 0.114*B`).
#[must_use = "returns the grayscale image"]
pub fn to_grayscale(image: &RgbImage) -> GrayImage {
    image::DynamicImage::ImageRgb8(image.clone()).to_luma8()
}
