//! Gaussian smoothing with an explicit kernel size.
//!
//! [`gaussian_kernel`] builds a normalized 1D kernel and
//! [`gaussian_smooth`] applies it horizontally then vertically through
//! [`imageproc::filter::separable_filter_equal`]. Borders replicate the
//! edge pixel. The same kernel doubles as the weighting for the adaptive
//! threshold's local mean.

use image::GrayImage;

/// Sigma implied by a kernel size when none is given explicitly
/// (`0.3 * ((size - 1) * 0.5 - 1) + 0.8`).
#[must_use]
pub fn sigma_for_size(size: u32) -> f32 {
    #[allow(clippy::cast_precision_loss)]
    let size = size as f32;
    0.3f32.mul_add((size - 1.0).mul_add(0.5, -1.0), 0.8)
}

/// Build a normalized Gaussian kernel of `size` taps.
///
/// `size` is forced odd (even sizes grow by one). A non-positive `sigma`
/// falls back to [`sigma_for_size`].
#[must_use]
pub fn gaussian_kernel(size: u32, sigma: f32) -> Vec<f32> {
    let size = size.max(1) | 1;
    let sigma = if sigma > 0.0 { sigma } else { sigma_for_size(size) };
    let radius = (size / 2).cast_signed();
    let denom = 2.0 * sigma * sigma;

    #[allow(clippy::cast_precision_loss)]
    let weights: Vec<f32> = (-radius..=radius)
        .map(|i| {
            let d = i as f32;
            (-(d * d) / denom).exp()
        })
        .collect();
    let total: f32 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

/// Smooth a grayscale image with a `size`×`size` Gaussian.
///
/// A size of 1 returns the image unchanged.
#[must_use = "returns the smoothed image"]
pub fn gaussian_smooth(image: &GrayImage, size: u32, sigma: f32) -> GrayImage {
    if size <= 1 || image.width() == 0 || image.height() == 0 {
        return image.clone();
    }
    let kernel = gaussian_kernel(size, sigma);
    imageproc::filter::separable_filter_equal(image, &kernel)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Create a test image with a sharp black-to-white boundary at x=5.
    fn sharp_edge_image() -> GrayImage {
        GrayImage::from_fn(10, 10, |x, _y| {
            if x < 5 {
                image::Luma([0])
            } else {
                image::Luma([255])
            }
        })
    }

    #[test]
    fn kernel_is_normalized_and_symmetric() {
        let k = gaussian_kernel(11, 0.0);
        assert_eq!(k.len(), 11);
        let total: f32 = k.iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
        for i in 0..5 {
            assert!((k[i] - k[10 - i]).abs() < 1e-7);
        }
        assert!(k[5] > k[4]);
    }

    #[test]
    fn even_size_rounds_up() {
        assert_eq!(gaussian_kernel(4, 1.0).len(), 5);
    }

    #[test]
    fn implied_sigma_for_block_eleven() {
        assert!((sigma_for_size(11) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn large_sigma_three_tap_kernel_is_nearly_flat() {
        let k = gaussian_kernel(3, 3.0);
        assert!(k.iter().all(|&w| (w - 1.0 / 3.0).abs() < 0.02));
    }

    #[test]
    fn smoothing_softens_edge() {
        let img = sharp_edge_image();
        let blurred = gaussian_smooth(&img, 3, 3.0);
        let left = blurred.get_pixel(4, 5).0[0];
        let right = blurred.get_pixel(5, 5).0[0];
        assert!(left > 0, "dark side of the edge should brighten");
        assert!(right < 255, "bright side of the edge should darken");
    }

    #[test]
    fn uniform_image_unchanged() {
        let img = GrayImage::from_pixel(8, 8, image::Luma([77]));
        let blurred = gaussian_smooth(&img, 3, 3.0);
        assert!(blurred.pixels().all(|p| p.0[0].abs_diff(77) <= 1));
    }

    #[test]
    fn size_one_is_identity() {
        let img = sharp_edge_image();
        assert_eq!(gaussian_smooth(&img, 1, 3.0), img);
    }
}
