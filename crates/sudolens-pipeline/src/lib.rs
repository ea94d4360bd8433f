//! sudolens-pipeline: Sudoku photo recognition (sans-IO).
//!
//! Turns encoded photo bytes into a 9×9 digit grid through:
//! decode -> working-square normalization -> grayscale + smoothing +
//! adaptive threshold -> outermost contours -> largest quadrilateral ->
//! perspective rectification -> 81 cells -> parallel per-cell
//! classification -> grid assembly.
//!
//! This crate has **no I/O dependencies**: it works on in-memory bytes,
//! takes the digit model as an injected [`DigitModel`], and hands debug
//! images to an injected [`ArtifactSink`]. Solving the recognized grid is
//! left to `sudolens-grid`.

pub mod artifacts;
pub mod assemble;
pub mod blur;
pub mod cells;
pub mod classify;
pub mod contour;
pub mod decode;
pub mod diagnostics;
pub mod downsample;
pub mod locate;
pub mod model;
pub mod pipeline;
pub mod rectify;
pub mod simplify;
pub mod threshold;
pub mod types;

use std::time::Duration;

use image::DynamicImage;
use sudolens_grid::SudokuGrid;
use web_time::Instant;

pub use artifacts::{Artifact, ArtifactSink, CollectedArtifacts, NoArtifacts};
pub use assemble::GridAssembler;
pub use cells::Cell;
pub use classify::{
    CLASS_COUNT, CellTensor, ClassifierParams, DigitModel, InferenceContext, InferenceError,
    Probabilities, TENSOR_SIDE,
};
pub use diagnostics::{PipelineDiagnostics, StageDiagnostics, StageMetrics};
pub use downsample::ResampleFilter;
pub use model::{OnnxContext, OnnxModel};
pub use pipeline::{Pipeline, StagedResult};
pub use rectify::Homography;
pub use types::{
    Dimensions, ErrorKind, ModelLoadError, PipelineConfig, PipelineError, Point, Polyline,
    Quadrilateral,
};

/// Recognize the Sudoku grid in a photo.
///
/// # Errors
///
/// Returns the first fatal [`PipelineError`]: invalid configuration,
/// unusable image, no grid, degenerate grid geometry, or an unavailable
/// model. Per-cell recognition faults are not errors; those cells read
/// as blank.
pub fn recognize<M: DigitModel>(
    image_bytes: &[u8],
    config: &PipelineConfig,
    model: &M,
) -> Result<SudokuGrid, PipelineError> {
    process_with_diagnostics(image_bytes, config, model, &mut NoArtifacts)
        .map(|(staged, _)| staged.grid)
}

/// Run the full pipeline, timing every stage and handing intermediate
/// images to `sink` as they are produced.
///
/// Artifacts produced before a failure are still delivered, so a
/// [`PipelineError::GridNotFound`] run leaves the mask and contour
/// overlay behind for inspection.
///
/// # Errors
///
/// As [`recognize`].
pub fn process_with_diagnostics<M: DigitModel, S: ArtifactSink + ?Sized>(
    image_bytes: &[u8],
    config: &PipelineConfig,
    model: &M,
    sink: &mut S,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError> {
    let total_start = Instant::now();
    let emit = sink.enabled();

    let (decoded, decode) = timed(|| Pipeline::new(image_bytes.to_vec(), config.clone()).decode());
    let decoded = decoded?;
    let decode = stage(decode, decoded.metrics());

    let (normalized, normalize) = timed(|| decoded.normalize());
    let normalize = stage(normalize, normalized.metrics());
    if emit {
        sink.write(
            Artifact::Working,
            &DynamicImage::ImageRgb8(normalized.working().clone()),
        );
    }

    let (preprocessed, preprocess) = timed(|| normalized.preprocess());
    let preprocess = stage(preprocess, preprocessed.metrics());
    if emit {
        sink.write(
            Artifact::Preprocessed,
            &DynamicImage::ImageLuma8(preprocessed.mask().clone()),
        );
    }

    let locate_start = Instant::now();
    let contours = preprocessed.contours();
    let found = preprocessed.find_border(&contours);
    if emit {
        let overlay = artifacts::contour_overlay(
            preprocessed.working(),
            &contours,
            found.as_ref().ok().map(|l| &l.quad),
        );
        sink.write(Artifact::Contours, &DynamicImage::ImageRgb8(overlay));
    }
    let located = preprocessed.with_border(contours, found?);
    let locate = stage(locate_start.elapsed(), located.metrics());

    let (rectified, rectify) = timed(|| located.rectify());
    let rectified = rectified?;
    let rectify = stage(rectify, rectified.metrics());
    if emit {
        sink.write(
            Artifact::Rectified,
            &DynamicImage::ImageLuma8(rectified.rectified().clone()),
        );
    }

    let (segmented, segment) = timed(|| rectified.segment());
    let segment = stage(segment, segmented.metrics());

    let (classified, classify) = timed(|| segmented.classify(model));
    let classified = classified?;
    let classify = stage(classify, classified.metrics());

    let (assembled, assemble) = timed(|| classified.assemble());
    let assembled = assembled?;
    let assemble = stage(assemble, assembled.metrics());

    log::debug!("recognized grid:\n{}", assembled.grid());

    let diagnostics = PipelineDiagnostics {
        decode,
        normalize,
        preprocess,
        locate,
        rectify,
        segment,
        classify,
        assemble,
        total_duration: total_start.elapsed(),
    };
    Ok((assembled.into_result(), diagnostics))
}

fn timed<T>(f: impl FnOnce() -> T) -> (T, Duration) {
    let start = Instant::now();
    let out = f();
    (out, start.elapsed())
}

const fn stage(duration: Duration, metrics: StageMetrics) -> StageDiagnostics {
    StageDiagnostics { duration, metrics }
}
