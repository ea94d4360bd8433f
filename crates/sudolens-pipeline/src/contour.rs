//! Contour tracing: extract the outer borders of foreground regions.
//!
//! Uses Suzuki-Abe border following via
//! [`imageproc::contours::find_contours`] and keeps only outermost
//! borders: outer borders with no enclosing parent. Digits printed inside
//! the grid sit in the holes of the grid frame, so their borders are
//! dropped here and never compete with the frame itself.

use image::GrayImage;
use imageproc::contours::{BorderType, Contour};

use crate::types::{Point, Polyline};

/// Trace the outermost contours of a binary mask (foreground = nonzero).
///
/// Contours come back in discovery order (raster scan of their first
/// pixel). Contours with fewer than 3 points enclose no area and are
/// dropped.
#[must_use = "returns the traced contours"]
pub fn external_contours(mask: &GrayImage) -> Vec<Polyline> {
    let contours: Vec<Contour<u32>> = imageproc::contours::find_contours(mask);

    contours
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .filter(|c| c.points.len() >= 3)
        .map(|c| {
            let points = c
                .points
                .into_iter()
                .map(|p| Point::new(f64::from(p.x), f64::from(p.y)))
                .collect();
            Polyline::new(points)
        })
        .collect()
}
