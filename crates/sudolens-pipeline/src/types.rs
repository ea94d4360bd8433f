//! Shared types for the sudolens recognition pipeline.

use serde::{Deserialize, Serialize};
use sudolens_grid::GridError;

use crate::downsample::ResampleFilter;

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate raster data without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage` so downstream crates can reference the decoded
/// photograph without depending on `image` directly.
pub use image::RgbImage;

/// A 2D point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }
}

/// A sequence of connected points. Contours are closed polylines: the
/// last point connects back to the first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline(Vec<Point>);

impl Polyline {
    /// Create a new polyline from a vector of points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the polyline has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points in the polyline.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// The puzzle's outer border as four corners in canonical order.
///
/// Corner order is decided by coordinate sums and differences, never by
/// the order a detector happened to emit them:
///
/// - top-left: smallest `x + y`
/// - bottom-right: largest `x + y`
/// - top-right: smallest `y - x`
/// - bottom-left: largest `y - x`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quadrilateral {
    /// Top-left corner.
    pub top_left: Point,
    /// Top-right corner.
    pub top_right: Point,
    /// Bottom-left corner.
    pub bottom_left: Point,
    /// Bottom-right corner.
    pub bottom_right: Point,
}

impl Quadrilateral {
    /// Order four points, given in any order, into canonical corners.
    ///
    /// Ties resolve to the first point in `points` holding the extreme
    /// value. The result may still be degenerate (repeated or collinear
    /// corners); [`is_degenerate`](Self::is_degenerate) checks for that.
    #[must_use]
    pub fn from_unordered(points: [Point; 4]) -> Self {
        let pick = |key: fn(&Point) -> f64, want_max: bool| -> Point {
            let mut best = points[0];
            for &p in &points[1..] {
                let better = if want_max {
                    key(&p) > key(&best)
                } else {
                    key(&p) < key(&best)
                };
                if better {
                    best = p;
                }
            }
            best
        };

        Self {
            top_left: pick(|p| p.x + p.y, false),
            bottom_right: pick(|p| p.x + p.y, true),
            top_right: pick(|p| p.y - p.x, false),
            bottom_left: pick(|p| p.y - p.x, true),
        }
    }

    /// Corners in canonical order: top-left, top-right, bottom-left,
    /// bottom-right.
    #[must_use]
    pub const fn corners(&self) -> [Point; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_left,
            self.bottom_right,
        ]
    }

    /// Whether any two corners coincide or any three are collinear.
    ///
    /// `tolerance` is the minimum triangle area (in square pixels) for
    /// three corners to count as non-collinear.
    #[must_use]
    pub fn is_degenerate(&self, tolerance: f64) -> bool {
        let c = self.corners();
        let triples = [(0, 1, 2), (0, 1, 3), (0, 2, 3), (1, 2, 3)];
        triples.iter().any(|&(a, b, d)| {
            let cross = (c[b].x - c[a].x).mul_add(c[d].y - c[a].y, -((c[b].y - c[a].y) * (c[d].x - c[a].x)));
            cross.abs() / 2.0 <= tolerance
        })
    }
}

/// Configuration for the recognition pipeline.
///
/// All parameters have defaults matching the reference photograph
/// workflow: a 450 px working square, a 450 px rectified grid and the
/// classifier thresholds the digit model was tuned for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Side length of the square working image the photo is scaled and
    /// padded into before preprocessing. `0` keeps the photo as decoded.
    pub working_resolution: u32,

    /// Resampling filter used when scaling to the working resolution.
    pub resample_filter: ResampleFilter,

    /// Gaussian smoothing kernel size (odd).
    pub blur_kernel: u32,

    /// Gaussian smoothing sigma.
    pub blur_sigma: f32,

    /// Adaptive threshold neighbourhood size (odd, at least 3).
    pub threshold_block: u32,

    /// Adaptive threshold offset subtracted from the local mean.
    pub threshold_offset: i16,

    /// Minimum contour area for a grid candidate, in square pixels at the
    /// reference resolution of 450. Scaled with the working resolution.
    pub min_quad_area: f64,

    /// Polygon approximation tolerance as a fraction of contour perimeter.
    pub approx_epsilon: f64,

    /// Side length of the rectified grid. Must be divisible by 9.
    pub rectified_side: u32,

    /// Pixels trimmed from each edge of every cell to drop grid lines.
    pub cell_margin: u32,

    /// Foreground fraction below which a cell is blank.
    pub blank_ratio: f64,

    /// Minimum top-class probability for a digit to be accepted. The
    /// comparison is strict: a probability equal to the threshold is
    /// rejected.
    pub confidence_threshold: f32,

    /// Number of recognition workers. `0` uses the available parallelism.
    pub workers: usize,
}

impl PipelineConfig {
    /// Default working resolution in pixels.
    pub const DEFAULT_WORKING_RESOLUTION: u32 = 450;
    /// Default resampling filter for the working resolution.
    pub const DEFAULT_RESAMPLE_FILTER: ResampleFilter = ResampleFilter::Triangle;
    /// Default Gaussian smoothing kernel size.
    pub const DEFAULT_BLUR_KERNEL: u32 = 3;
    /// Default Gaussian smoothing sigma.
    pub const DEFAULT_BLUR_SIGMA: f32 = 3.0;
    /// Default adaptive threshold block size.
    pub const DEFAULT_THRESHOLD_BLOCK: u32 = 11;
    /// Default adaptive threshold offset.
    pub const DEFAULT_THRESHOLD_OFFSET: i16 = 2;
    /// Default minimum grid candidate area.
    pub const DEFAULT_MIN_QUAD_AREA: f64 = 500.0;
    /// Default polygon approximation tolerance.
    pub const DEFAULT_APPROX_EPSILON: f64 = 0.02;
    /// Default rectified grid side length.
    pub const DEFAULT_RECTIFIED_SIDE: u32 = 450;
    /// Default per-cell border trim.
    pub const DEFAULT_CELL_MARGIN: u32 = 4;
    /// Default blank-cell foreground fraction.
    pub const DEFAULT_BLANK_RATIO: f64 = 0.02;
    /// Default classifier confidence threshold.
    pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.85;

    /// Resolution at which [`min_quad_area`](Self::min_quad_area) is
    /// expressed.
    pub const REFERENCE_RESOLUTION: u32 = 450;

    /// Check the invariants the pipeline stages rely on.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] describing the first
    /// violated invariant.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let fail = |msg: String| Err(PipelineError::InvalidConfig(msg));

        if self.blur_kernel == 0 || self.blur_kernel % 2 == 0 {
            return fail(format!("blur_kernel must be odd, got {}", self.blur_kernel));
        }
        if self.threshold_block < 3 || self.threshold_block % 2 == 0 {
            return fail(format!(
                "threshold_block must be odd and at least 3, got {}",
                self.threshold_block
            ));
        }
        if self.rectified_side == 0 || self.rectified_side % 9 != 0 {
            return fail(format!(
                "rectified_side must be a positive multiple of 9, got {}",
                self.rectified_side
            ));
        }
        if self.rectified_side / 9 <= 2 * self.cell_margin {
            return fail(format!(
                "cell_margin {} leaves nothing of a {} px cell",
                self.cell_margin,
                self.rectified_side / 9
            ));
        }
        if !(self.approx_epsilon > 0.0 && self.approx_epsilon < 1.0) {
            return fail(format!(
                "approx_epsilon must be in (0, 1), got {}",
                self.approx_epsilon
            ));
        }
        if !(0.0..=1.0).contains(&self.blank_ratio) {
            return fail(format!(
                "blank_ratio must be in [0, 1], got {}",
                self.blank_ratio
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return fail(format!(
                "confidence_threshold must be in [0, 1], got {}",
                self.confidence_threshold
            ));
        }
        Ok(())
    }

    /// Minimum candidate area at the actual working resolution.
    #[must_use]
    pub fn scaled_min_quad_area(&self, working_side: u32) -> f64 {
        let scale = f64::from(working_side) / f64::from(Self::REFERENCE_RESOLUTION);
        self.min_quad_area * scale * scale
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            working_resolution: Self::DEFAULT_WORKING_RESOLUTION,
            resample_filter: Self::DEFAULT_RESAMPLE_FILTER,
            blur_kernel: Self::DEFAULT_BLUR_KERNEL,
            blur_sigma: Self::DEFAULT_BLUR_SIGMA,
            threshold_block: Self::DEFAULT_THRESHOLD_BLOCK,
            threshold_offset: Self::DEFAULT_THRESHOLD_OFFSET,
            min_quad_area: Self::DEFAULT_MIN_QUAD_AREA,
            approx_epsilon: Self::DEFAULT_APPROX_EPSILON,
            rectified_side: Self::DEFAULT_RECTIFIED_SIDE,
            cell_margin: Self::DEFAULT_CELL_MARGIN,
            blank_ratio: Self::DEFAULT_BLANK_RATIO,
            confidence_threshold: Self::DEFAULT_CONFIDENCE_THRESHOLD,
            workers: 0,
        }
    }
}

/// The digit model could not be loaded or a worker context could not be
/// created from it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to load digit model: {0}")]
pub struct ModelLoadError(pub String);

/// Errors that abort a recognition request.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// The image decoded to zero width or height.
    #[error("decoded image has zero area")]
    EmptyImage,

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    /// No four-cornered contour large enough to be the puzzle was found.
    #[error("sudoku grid not found in image")]
    GridNotFound,

    /// The detected corners cannot define a perspective transform.
    #[error("grid corners are degenerate; cannot rectify")]
    DegenerateQuad,

    /// The digit model is unavailable.
    #[error(transparent)]
    ModelLoad(#[from] ModelLoadError),

    /// The recognition worker pool could not be started.
    #[error("failed to start recognition workers: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    /// A label or position was rejected by the grid model.
    #[error(transparent)]
    Grid(#[from] GridError),

    /// Grid assembly finished before every cell reported a label.
    #[error("no label for cell {missing}")]
    Incomplete {
        /// First position without a label.
        missing: sudolens_grid::CellPos,
    },
}

impl PipelineError {
    /// The user-facing error category.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ImageDecode(_) | Self::EmptyInput | Self::EmptyImage => ErrorKind::InvalidImage,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::GridNotFound => ErrorKind::GridNotFound,
            Self::DegenerateQuad => ErrorKind::DegenerateQuad,
            Self::ModelLoad(_) | Self::WorkerPool(_) => ErrorKind::ModelLoadFailure,
            Self::Grid(_) | Self::Incomplete { .. } => ErrorKind::ClassificationError,
        }
    }
}

/// Error categories exposed to callers alongside a human-readable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Undecodable or empty input.
    InvalidImage,
    /// No qualifying quadrilateral.
    GridNotFound,
    /// Unusable grid geometry.
    DegenerateQuad,
    /// Recognition could not produce a full grid.
    ClassificationError,
    /// The digit model could not be loaded.
    ModelLoadFailure,
    /// The puzzle has no unique solution.
    SolverFailure,
    /// Rejected configuration.
    InvalidConfig,
}
