//! Polygon approximation of closed contours.
//!
//! Ramer-Douglas-Peucker on a closed curve: the curve is split at two
//! extreme points (the point farthest from the first point, and the point
//! farthest from that one), and each half is simplified independently.
//! Splitting at extremes means a convex quadrilateral's corners survive
//! regardless of where border following happened to start the contour.
//!
//! Also hosts the perimeter and shoelace area helpers the grid locator
//! ranks candidates with.

use crate::types::Point;

/// Approximate a closed contour with a polygon whose vertices are a subset
/// of the contour points.
///
/// Every dropped point lies within `epsilon` pixels of the polygon edge
/// spanning it. Vertices keep their contour order. Contours with fewer
/// than 3 points are returned unchanged.
#[must_use = "returns the approximated polygon"]
pub fn approximate_closed(points: &[Point], epsilon: f64) -> Vec<Point> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }

    let first = farthest_from(points, points[0]);
    let second = farthest_from(points, points[first]);
    if first == second {
        // Every point coincides.
        return vec![points[0]];
    }
    let (lo, hi) = (first.min(second), first.max(second));

    let mut kept = vec![false; n];
    kept[lo] = true;
    kept[hi] = true;
    rdp_recurse(points, lo, hi, epsilon, &mut kept);

    // The other half wraps around the end of the contour.
    let wrap: Vec<usize> = (hi..n).chain(0..=lo).collect();
    let wrap_points: Vec<Point> = wrap.iter().map(|&i| points[i]).collect();
    let mut wrap_kept = vec![false; wrap.len()];
    rdp_recurse(&wrap_points, 0, wrap.len() - 1, epsilon, &mut wrap_kept);
    for (&index, &k) in wrap.iter().zip(&wrap_kept) {
        if k {
            kept[index] = true;
        }
    }

    points
        .iter()
        .zip(&kept)
        .filter(|&(_, k)| *k)
        .map(|(&p, _)| p)
        .collect()
}

/// Perimeter of a closed curve, including the closing segment.
#[must_use]
pub fn closed_length(points: &[Point]) -> f64 {
    match points {
        [] | [_] => 0.0,
        [.., last] => {
            let open: f64 = points.windows(2).map(|w| w[0].distance(w[1])).sum();
            open + last.distance(points[0])
        }
    }
}

/// Unsigned area of a simple polygon (shoelace formula).
#[must_use]
pub fn polygon_area(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: f64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x.mul_add(b.y, -(b.x * a.y)))
        .sum();
    twice.abs() / 2.0
}

/// Index of the point farthest from `origin`; the first one wins ties.
fn farthest_from(points: &[Point], origin: Point) -> usize {
    let mut best = 0;
    let mut best_dist = 0.0;
    for (i, &p) in points.iter().enumerate() {
        let d = p.distance_squared(origin);
        if d > best_dist {
            best_dist = d;
            best = i;
        }
    }
    best
}

/// Recursive step of the Ramer-Douglas-Peucker algorithm.
///
/// Finds the point between `start` and `end` that is farthest from the
/// line segment between them. If that distance exceeds `tolerance`, the
/// point is kept and both sub-segments are processed recursively.
fn rdp_recurse(points: &[Point], start: usize, end: usize, tolerance: f64, kept: &mut [bool]) {
    if end <= start + 1 {
        return;
    }

    let mut max_dist = 0.0;
    let mut max_idx = start;

    for i in (start + 1)..end {
        let d = perpendicular_distance(points[i], points[start], points[end]);
        if d > max_dist {
            max_dist = d;
            max_idx = i;
        }
    }

    if max_dist > tolerance {
        kept[max_idx] = true;
        rdp_recurse(points, start, max_idx, tolerance, kept);
        rdp_recurse(points, max_idx, end, tolerance, kept);
    }
}

/// Perpendicular distance from point `p` to the line defined by `a` and `b`.
///
/// When `a` and `b` coincide, returns the distance from `p` to `a`.
fn perpendicular_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_sq = dx.mul_add(dx, dy * dy);

    if length_sq == 0.0 {
        return p.distance(a);
    }

    let cross = dx.mul_add(a.y - p.y, -(dy * (a.x - p.x)));
    cross.abs() / length_sq.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Walk the border of an axis-aligned square one pixel at a time,
    /// starting `start_offset` pixels along the top edge.
    fn square_border(x0: f64, y0: f64, side: u32, start_offset: usize) -> Vec<Point> {
        let s = f64::from(side);
        let mut pts = Vec::new();
        for i in 0..side {
            pts.push(Point::new(x0 + f64::from(i), y0));
        }
        for i in 0..side {
            pts.push(Point::new(x0 + s, y0 + f64::from(i)));
        }
        for i in 0..side {
            pts.push(Point::new(x0 + s - f64::from(i), y0 + s));
        }
        for i in 0..side {
            pts.push(Point::new(x0, y0 + s - f64::from(i)));
        }
        pts.rotate_left(start_offset);
        pts
    }

    #[test]
    fn square_border_reduces_to_corners() {
        let pts = square_border(10.0, 10.0, 100, 0);
        let eps = 0.02 * closed_length(&pts);
        let poly = approximate_closed(&pts, eps);
        assert_eq!(poly.len(), 4, "got {poly:?}");
        assert!((polygon_area(&poly) - 10_000.0).abs() < 1e-9);
    }

    #[test]
    fn starting_mid_edge_still_finds_four_corners() {
        let pts = square_border(0.0, 0.0, 80, 37);
        let eps = 0.02 * closed_length(&pts);
        let poly = approximate_closed(&pts, eps);
        assert_eq!(poly.len(), 4, "got {poly:?}");
        for corner in [(0.0, 0.0), (80.0, 0.0), (80.0, 80.0), (0.0, 80.0)] {
            assert!(
                poly.contains(&Point::new(corner.0, corner.1)),
                "missing corner {corner:?} in {poly:?}",
            );
        }
    }

    #[test]
    fn tiny_inputs_unchanged() {
        assert!(approximate_closed(&[], 1.0).is_empty());
        let two = [Point::new(0.0, 0.0), Point::new(1.0, 0.0)];
        assert_eq!(approximate_closed(&two, 1.0), two.to_vec());
    }

    #[test]
    fn coincident_points_collapse() {
        let pts = [Point::new(2.0, 2.0); 5];
        assert_eq!(approximate_closed(&pts, 1.0), vec![Point::new(2.0, 2.0)]);
    }

    #[test]
    fn triangle_keeps_three_vertices() {
        let pts = vec![
            Point::new(0.0, 0.0),
            Point::new(5.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(5.0, 8.0),
        ];
        let poly = approximate_closed(&pts, 0.5);
        assert_eq!(poly.len(), 3);
    }

    #[test]
    fn closed_length_includes_closing_edge() {
        let pts = [
            Point::new(0.0, 0.0),
            Point::new(3.0, 0.0),
            Point::new(3.0, 4.0),
        ];
        assert!((closed_length(&pts) - 12.0).abs() < 1e-12);
        assert!(closed_length(&pts[..1]).abs() < f64::EPSILON);
    }

    #[test]
    fn area_is_orientation_independent() {
        let ccw = [
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(4.0, 3.0),
            Point::new(0.0, 3.0),
        ];
        let mut cw = ccw;
        cw.reverse();
        assert!((polygon_area(&ccw) - 12.0).abs() < 1e-12);
        assert!((polygon_area(&cw) - 12.0).abs() < 1e-12);
    }

    #[test]
    fn perpendicular_distance_on_axis() {
        let d = perpendicular_distance(
            Point::new(1.0, 3.0),
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
        );
        assert!((d - 3.0).abs() < 1e-10);
    }

    #[test]
    fn perpendicular_distance_coincident_endpoints() {
        let d = perpendicular_distance(
            Point::new(3.0, 4.0),
            Point::new(0.0, 0.0),
            Point::new(0.0, 0.0),
        );
        assert!((d - 5.0).abs() < 1e-10);
    }
}
