//! Perspective rectification of the located grid.
//!
//! A planar homography maps the four canonical corners of the detected
//! border onto the corners of a `side`×`side` square. The photo is warped
//! through it with bilinear interpolation, producing a front-on view of
//! the puzzle whose cells sit on a regular 9×9 lattice.

use image::{GrayImage, Luma};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};

use crate::types::{PipelineError, Point, Quadrilateral};

/// Triangles spanned by three corners must enclose more than this many
/// square pixels for the quadrilateral to be usable.
const COLLINEAR_TOLERANCE: f64 = 0.5;

/// A projective transform between the working image and the rectified
/// square.
#[derive(Debug, Clone, Copy)]
pub struct Homography(Projection);

impl Homography {
    /// The transform taking each `src[i]` to `dst[i]`.
    ///
    /// Returns `None` when the correspondences do not determine a unique
    /// transform (three collinear points on either side).
    #[must_use]
    pub fn from_correspondences(src: &[Point; 4], dst: &[Point; 4]) -> Option<Self> {
        Projection::from_control_points(src.map(to_f32), dst.map(to_f32)).map(Self)
    }

    /// The underlying `imageproc` projection, for use with its warps.
    #[must_use]
    pub const fn projection(&self) -> &Projection {
        &self.0
    }

    /// Map a point through the transform.
    #[must_use]
    pub fn apply(&self, p: Point) -> Point {
        let (x, y) = self.0 * to_f32(p);
        Point::new(f64::from(x), f64::from(y))
    }
}

#[allow(clippy::cast_possible_truncation)]
fn to_f32(p: Point) -> (f32, f32) {
    (p.x as f32, p.y as f32)
}

/// Destination corners for a `side`×`side` square, in the order
/// top-left, top-right, bottom-left, bottom-right.
#[must_use]
pub fn square_corners(side: u32) -> [Point; 4] {
    let s = f64::from(side);
    [
        Point::new(0.0, 0.0),
        Point::new(s, 0.0),
        Point::new(0.0, s),
        Point::new(s, s),
    ]
}

/// Warp the region bounded by `quad` into a `side`×`side` grayscale square.
///
/// Pixels that map outside the source image are black.
///
/// # Errors
///
/// Returns [`PipelineError::DegenerateQuad`] if corners coincide, three
/// corners are collinear, or the transform is singular.
pub fn rectify(
    image: &GrayImage,
    quad: &Quadrilateral,
    side: u32,
) -> Result<(GrayImage, Homography), PipelineError> {
    if quad.is_degenerate(COLLINEAR_TOLERANCE) {
        return Err(PipelineError::DegenerateQuad);
    }

    let homography = Homography::from_correspondences(&quad.corners(), &square_corners(side))
        .ok_or(PipelineError::DegenerateQuad)?;

    let mut out = GrayImage::new(side, side);
    warp_into(
        image,
        homography.projection(),
        Interpolation::Bilinear,
        Luma([0]),
        &mut out,
    );
    Ok((out, homography))
}
