//! Grid location: pick the puzzle's outer border among traced contours.
//!
//! Each outermost contour is approximated by a polygon with a tolerance
//! proportional to its perimeter. Candidates with exactly four vertices
//! and an area above the minimum compete; the largest area wins, and the
//! earliest contour wins a tie.

use crate::simplify::{approximate_closed, closed_length, polygon_area};
use crate::types::{PipelineError, Point, Polyline, Quadrilateral};

/// Result of scanning contours for the grid border.
#[derive(Debug, Clone, PartialEq)]
pub struct Located {
    /// The winning border in canonical corner order.
    pub quad: Quadrilateral,
    /// Area of the winning candidate's contour.
    pub area: f64,
    /// Index of the winning contour in the input slice.
    pub contour_index: usize,
    /// Number of four-cornered candidates that cleared the area minimum.
    pub candidates: usize,
}

/// Find the largest four-cornered contour with area above `min_area`.
///
/// `epsilon_fraction` scales each contour's perimeter into the polygon
/// approximation tolerance.
///
/// # Errors
///
/// Returns [`PipelineError::GridNotFound`] when no contour qualifies.
pub fn locate_grid(
    contours: &[Polyline],
    min_area: f64,
    epsilon_fraction: f64,
) -> Result<Located, PipelineError> {
    let mut best: Option<Located> = None;
    let mut candidates = 0;

    for (index, contour) in contours.iter().enumerate() {
        let points = contour.points();
        let area = polygon_area(points);
        if area <= min_area {
            continue;
        }

        let epsilon = epsilon_fraction * closed_length(points);
        let polygon = approximate_closed(points, epsilon);
        let Ok(corners) = <[Point; 4]>::try_from(polygon.as_slice()) else {
            continue;
        };

        candidates += 1;
        if best.as_ref().is_none_or(|b| area > b.area) {
            best = Some(Located {
                quad: Quadrilateral::from_unordered(corners),
                area,
                contour_index: index,
                candidates: 0,
            });
        }
    }

    let mut located = best.ok_or(PipelineError::GridNotFound)?;
    located.candidates = candidates;
    log::debug!(
        "grid border: contour {} of {}, area {:.0}, {} candidate(s)",
        located.contour_index,
        contours.len(),
        located.area,
        candidates,
    );
    Ok(located)
}
