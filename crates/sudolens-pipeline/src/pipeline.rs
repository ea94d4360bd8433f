//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! ```rust
//! # use sudolens_pipeline::{DigitModel, Pipeline, PipelineConfig, PipelineError};
//! # fn run<M: DigitModel>(photo: Vec<u8>, model: &M) -> Result<(), PipelineError> {
//! let assembled = Pipeline::new(photo, PipelineConfig::default())
//!     .decode()?
//!     .normalize()
//!     .preprocess()
//!     .locate()?
//!     .rectify()?
//!     .segment()
//!     .classify(model)?
//!     .assemble()?;
//!
//! println!("{}", assembled.grid());
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next state (or a
//! `Result` for fallible stages), carrying forward what later stages and
//! [`StagedResult`] need. Accessors expose the current stage's output and
//! [`metrics`](Decoded::metrics) summarizes it for diagnostics.

use image::{GrayImage, RgbImage};
use sudolens_grid::{CellPos, SudokuGrid};

use crate::cells::Cell;
use crate::classify::{ClassifierParams, DigitModel};
use crate::diagnostics::StageMetrics;
use crate::locate::Located;
use crate::rectify::Homography;
use crate::types::{Dimensions, PipelineConfig, PipelineError, Polyline, Quadrilateral};

/// Entry point for the staged pipeline.
pub struct Pipeline;

impl Pipeline {
    /// Start a run over encoded image bytes.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(source: Vec<u8>, config: PipelineConfig) -> Pending {
        Pending { config, source }
    }
}

/// Every intermediate of a completed run.
#[derive(Debug, Clone)]
pub struct StagedResult {
    /// Decoded photo dimensions.
    pub original: Dimensions,
    /// Photo scaled and padded to the working square.
    pub working: RgbImage,
    /// Binary mask after smoothing and adaptive threshold.
    pub mask: GrayImage,
    /// Outermost contours of the mask.
    pub contours: Vec<Polyline>,
    /// The chosen grid border.
    pub quad: Quadrilateral,
    /// Perspective-corrected grid.
    pub rectified: GrayImage,
    /// Recognized digits, 0 for blank.
    pub grid: SudokuGrid,
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
#[must_use = "pipeline stages are consumed by advancing — call .decode() to continue"]
pub struct Pending {
    config: PipelineConfig,
    source: Vec<u8>,
}

impl Pending {
    /// Validate the configuration and decode the source image.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for a rejected
    /// configuration, and the errors of
    /// [`decode_rgb`](crate::decode::decode_rgb) for unusable bytes.
    pub fn decode(self) -> Result<Decoded, PipelineError> {
        self.config.validate()?;
        let original = crate::decode::decode_rgb(&self.source)?;
        Ok(Decoded {
            config: self.config,
            original,
            source_len: self.source.len(),
        })
    }
}

// ───────────────────────── Stage 1: Decoded ──────────────────────────

/// Pipeline state after decoding the source image.
#[must_use = "pipeline stages are consumed by advancing — call .normalize() to continue"]
pub struct Decoded {
    config: PipelineConfig,
    original: RgbImage,
    source_len: usize,
}

impl Decoded {
    /// The decoded photo.
    #[must_use]
    pub const fn original(&self) -> &RgbImage {
        &self.original
    }

    /// Metrics for this stage.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::Decode {
            input_bytes: self.source_len,
            width: self.original.width(),
            height: self.original.height(),
        }
    }

    /// Scale and pad the photo to the working square.
    pub fn normalize(self) -> Normalized {
        let (working, scale) = crate::downsample::normalize_to_square(
            &self.original,
            self.config.working_resolution,
            self.config.resample_filter,
        );
        log::debug!(
            "normalized {}x{} -> {}x{} (scale {scale:.3})",
            self.original.width(),
            self.original.height(),
            working.width(),
            working.height(),
        );
        Normalized {
            config: self.config,
            original: Dimensions {
                width: self.original.width(),
                height: self.original.height(),
            },
            working,
            scale,
        }
    }
}

// ───────────────────────── Stage 2: Normalized ───────────────────────

/// Pipeline state after scaling to the working square.
#[must_use = "pipeline stages are consumed by advancing — call .preprocess() to continue"]
pub struct Normalized {
    config: PipelineConfig,
    original: Dimensions,
    working: RgbImage,
    scale: f64,
}

impl Normalized {
    /// The working image.
    #[must_use]
    pub const fn working(&self) -> &RgbImage {
        &self.working
    }

    /// Metrics for this stage.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::Normalize {
            side: self.working.width(),
            scale: self.scale,
        }
    }

    /// Grayscale, smooth and threshold into the binary mask.
    pub fn preprocess(self) -> Preprocessed {
        let gray = crate::decode::to_grayscale(&self.working);
        let smoothed =
            crate::blur::gaussian_smooth(&gray, self.config.blur_kernel, self.config.blur_sigma);
        let mask = crate::threshold::adaptive_threshold_inverse(
            &smoothed,
            self.config.threshold_block,
            self.config.threshold_offset,
        );
        Preprocessed {
            config: self.config,
            original: self.original,
            working: self.working,
            gray,
            mask,
        }
    }
}

// ───────────────────────── Stage 3: Preprocessed ─────────────────────

/// Pipeline state after building the binary mask.
#[must_use = "pipeline stages are consumed by advancing — call .locate() to continue"]
pub struct Preprocessed {
    config: PipelineConfig,
    original: Dimensions,
    working: RgbImage,
    gray: GrayImage,
    mask: GrayImage,
}

impl Preprocessed {
    /// The binary mask (grid lines and digits are foreground).
    #[must_use]
    pub const fn mask(&self) -> &GrayImage {
        &self.mask
    }

    /// The working image, for overlays.
    #[must_use]
    pub const fn working(&self) -> &RgbImage {
        &self.working
    }

    /// Metrics for this stage.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::Preprocess {
            foreground_pixels: crate::threshold::foreground_count(&self.mask),
            total_pixels: u64::from(self.mask.width()) * u64::from(self.mask.height()),
        }
    }

    /// Trace outermost contours of the mask.
    ///
    /// Exposed separately from [`locate`](Self::locate) so callers can
    /// draw contours even when no border qualifies.
    #[must_use]
    pub fn contours(&self) -> Vec<Polyline> {
        crate::contour::external_contours(&self.mask)
    }

    /// Choose the grid border among `contours` without advancing.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::GridNotFound`] when no four-cornered
    /// contour is large enough.
    pub fn find_border(&self, contours: &[Polyline]) -> Result<Located, PipelineError> {
        let min_area = self
            .config
            .scaled_min_quad_area(self.mask.width().max(self.mask.height()));
        let located = crate::locate::locate_grid(contours, min_area, self.config.approx_epsilon)?;
        let q = &located.quad;
        log::info!(
            "grid located: TL ({:.0}, {:.0}) TR ({:.0}, {:.0}) BL ({:.0}, {:.0}) BR ({:.0}, {:.0})",
            q.top_left.x,
            q.top_left.y,
            q.top_right.x,
            q.top_right.y,
            q.bottom_left.x,
            q.bottom_left.y,
            q.bottom_right.x,
            q.bottom_right.y,
        );
        Ok(located)
    }

    /// Advance with a border already found by
    /// [`find_border`](Self::find_border) over `contours`.
    pub fn with_border(self, contours: Vec<Polyline>, located: Located) -> LocatedStage {
        LocatedStage {
            config: self.config,
            original: self.original,
            working: self.working,
            gray: self.gray,
            mask: self.mask,
            contours,
            located,
        }
    }

    /// Trace contours, find the grid border and advance.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::GridNotFound`] when no four-cornered
    /// contour is large enough.
    pub fn locate(self) -> Result<LocatedStage, PipelineError> {
        let contours = self.contours();
        let located = self.find_border(&contours)?;
        Ok(self.with_border(contours, located))
    }
}

// ───────────────────────── Stage 4: Located ──────────────────────────

/// Pipeline state after choosing the grid border.
#[must_use = "pipeline stages are consumed by advancing — call .rectify() to continue"]
pub struct LocatedStage {
    config: PipelineConfig,
    original: Dimensions,
    working: RgbImage,
    gray: GrayImage,
    mask: GrayImage,
    contours: Vec<Polyline>,
    located: Located,
}

impl LocatedStage {
    /// The chosen border.
    #[must_use]
    pub const fn quad(&self) -> &Quadrilateral {
        &self.located.quad
    }

    /// All outermost contours that were considered.
    #[must_use]
    pub fn contours(&self) -> &[Polyline] {
        &self.contours
    }

    /// The working image, for overlays.
    #[must_use]
    pub const fn working(&self) -> &RgbImage {
        &self.working
    }

    /// Metrics for this stage.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::Locate {
            contour_count: self.contours.len(),
            candidate_count: self.located.candidates,
            border_area: self.located.area,
        }
    }

    /// Warp the border region to the rectified square.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DegenerateQuad`] for unusable corners.
    pub fn rectify(self) -> Result<Rectified, PipelineError> {
        let (rectified, homography) =
            crate::rectify::rectify(&self.gray, &self.located.quad, self.config.rectified_side)?;
        Ok(Rectified {
            config: self.config,
            original: self.original,
            working: self.working,
            mask: self.mask,
            contours: self.contours,
            quad: self.located.quad,
            rectified,
            homography,
        })
    }
}

// ───────────────────────── Stage 5: Rectified ────────────────────────

/// Pipeline state after perspective correction.
#[must_use = "pipeline stages are consumed by advancing — call .segment() to continue"]
pub struct Rectified {
    config: PipelineConfig,
    original: Dimensions,
    working: RgbImage,
    mask: GrayImage,
    contours: Vec<Polyline>,
    quad: Quadrilateral,
    rectified: GrayImage,
    homography: Homography,
}

impl Rectified {
    /// The rectified grid image.
    #[must_use]
    pub const fn rectified(&self) -> &GrayImage {
        &self.rectified
    }

    /// The transform from working-image to rectified coordinates.
    #[must_use]
    pub const fn homography(&self) -> &Homography {
        &self.homography
    }

    /// Metrics for this stage.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::Rectify {
            side: self.rectified.width(),
        }
    }

    /// Cut the rectified grid into 81 cells.
    pub fn segment(self) -> Segmented {
        let cells = crate::cells::segment(&self.rectified, self.config.cell_margin);
        Segmented {
            config: self.config,
            original: self.original,
            working: self.working,
            mask: self.mask,
            contours: self.contours,
            quad: self.quad,
            rectified: self.rectified,
            cells,
        }
    }
}

// ───────────────────────── Stage 6: Segmented ────────────────────────

/// Pipeline state after cell segmentation.
#[must_use = "pipeline stages are consumed by advancing — call .classify() to continue"]
pub struct Segmented {
    config: PipelineConfig,
    original: Dimensions,
    working: RgbImage,
    mask: GrayImage,
    contours: Vec<Polyline>,
    quad: Quadrilateral,
    rectified: GrayImage,
    cells: Vec<Cell>,
}

impl Segmented {
    /// The 81 cells in row-major order.
    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Metrics for this stage.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::Segment {
            cell_count: self.cells.len(),
            cell_side: self.cells.first().map_or(0, |c| c.image.width()),
        }
    }

    /// Classify every cell on the worker pool.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ModelLoad`] or
    /// [`PipelineError::WorkerPool`] if recognition cannot start.
    pub fn classify<M: DigitModel>(self, model: &M) -> Result<Classified, PipelineError> {
        let workers = crate::classify::resolve_workers(self.config.workers).min(self.cells.len().max(1));
        let labels = crate::classify::classify_cells(
            &self.cells,
            model,
            ClassifierParams::from(&self.config),
            workers,
        )?;
        Ok(Classified {
            original: self.original,
            working: self.working,
            mask: self.mask,
            contours: self.contours,
            quad: self.quad,
            rectified: self.rectified,
            labels,
            workers,
        })
    }
}

// ───────────────────────── Stage 7: Classified ───────────────────────

/// Pipeline state after per-cell classification.
#[must_use = "pipeline stages are consumed by advancing — call .assemble() to continue"]
pub struct Classified {
    original: Dimensions,
    working: RgbImage,
    mask: GrayImage,
    contours: Vec<Polyline>,
    quad: Quadrilateral,
    rectified: GrayImage,
    labels: Vec<(CellPos, u8)>,
    workers: usize,
}

impl Classified {
    /// Per-cell labels in completion order.
    #[must_use]
    pub fn labels(&self) -> &[(CellPos, u8)] {
        &self.labels
    }

    /// Metrics for this stage.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        let blank_cells = self.labels.iter().filter(|(_, label)| *label == 0).count();
        StageMetrics::Classify {
            workers: self.workers,
            digit_cells: self.labels.len() - blank_cells,
            blank_cells,
        }
    }

    /// Merge the labels into a grid.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Incomplete`] if a cell never reported.
    pub fn assemble(self) -> Result<Assembled, PipelineError> {
        let grid = crate::assemble::assemble(self.labels)?;
        Ok(Assembled {
            result: StagedResult {
                original: self.original,
                working: self.working,
                mask: self.mask,
                contours: self.contours,
                quad: self.quad,
                rectified: self.rectified,
                grid,
            },
        })
    }
}

// ───────────────────────── Stage 8: Assembled ────────────────────────

/// Final pipeline state.
#[must_use = "call .into_result() to extract the StagedResult"]
pub struct Assembled {
    result: StagedResult,
}

impl Assembled {
    /// The recognized grid.
    #[must_use]
    pub const fn grid(&self) -> &SudokuGrid {
        &self.result.grid
    }

    /// Metrics for this stage.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::Assemble {
            givens: 81 - self.result.grid.empty_count(),
        }
    }

    /// Consume the pipeline and return every intermediate.
    #[must_use]
    pub fn into_result(self) -> StagedResult {
        self.result
    }
}
