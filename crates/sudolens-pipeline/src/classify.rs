//! Per-cell digit classification.
//!
//! Each cell is binarized with an inverse Otsu threshold. Cells that are
//! uniform, or whose foreground covers less than the blank ratio, are
//! blank without consulting the model. Otherwise the ink's bounding box
//! is cropped, padded to a square, resized to 32×32 and scaled to
//! `[0, 1]` before inference. The top class is accepted only when its
//! probability is strictly above the confidence threshold; everything
//! else, including inference errors, becomes blank.
//!
//! Cells are classified on a dedicated rayon pool. Each worker creates
//! its own [`InferenceContext`] once, warms it up, and reuses it for its
//! whole share of cells.

use std::num::NonZeroUsize;

use image::{GrayImage, Luma, imageops};
use rayon::prelude::*;
use sudolens_grid::CellPos;

use crate::cells::Cell;
use crate::threshold::{FOREGROUND, foreground_ratio, is_uniform, otsu_inverse};
use crate::types::{ModelLoadError, PipelineConfig, PipelineError};

/// Side length of the square model input.
pub const TENSOR_SIDE: u32 = 32;

/// Number of output classes (digits `0..=9`; class 0 means blank).
pub const CLASS_COUNT: usize = 10;

/// Class probabilities produced by a model.
pub type Probabilities = [f32; CLASS_COUNT];

/// A 32×32 single-channel model input, row-major, values in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct CellTensor(Vec<f32>);

impl CellTensor {
    /// Number of values in a tensor.
    #[allow(clippy::cast_possible_truncation)]
    pub const LEN: usize = (TENSOR_SIDE * TENSOR_SIDE) as usize;

    /// An all-zero tensor, used for warm-up.
    #[must_use]
    pub fn zeros() -> Self {
        Self(vec![0.0; Self::LEN])
    }

    /// Scale a 32×32 grayscale image into a tensor.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::InputShape`] if the image is not 32×32.
    pub fn from_image(image: &GrayImage) -> Result<Self, InferenceError> {
        if image.dimensions() != (TENSOR_SIDE, TENSOR_SIDE) {
            return Err(InferenceError::InputShape {
                expected: Self::LEN,
                found: image.as_raw().len(),
            });
        }
        Ok(Self(
            image.as_raw().iter().map(|&v| f32::from(v) / 255.0).collect(),
        ))
    }

    /// Tensor values, row-major.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

/// A single cell could not be classified. Never fatal: the cell is
/// reported blank.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InferenceError {
    /// The cell has no pixels or no ink to crop.
    #[error("cell has no foreground to classify")]
    EmptyCell,
    /// The model input has the wrong size.
    #[error("model input has {found} values, expected {expected}")]
    InputShape {
        /// Values the model expects.
        expected: usize,
        /// Values supplied.
        found: usize,
    },
    /// The model produced NaN or infinite probabilities.
    #[error("model produced non-finite probabilities")]
    NonFinite,
    /// Backend-specific failure.
    #[error("inference failed: {0}")]
    Backend(String),
}

/// Per-worker inference state.
///
/// Contexts are created once per worker and reused across that worker's
/// cells, so a context may keep scratch buffers between calls.
pub trait InferenceContext {
    /// Class probabilities for one prepared cell.
    ///
    /// # Errors
    ///
    /// Returns an [`InferenceError`] when the input cannot be evaluated.
    fn predict(&mut self, input: &CellTensor) -> Result<Probabilities, InferenceError>;

    /// Run one throwaway inference so the first real cell does not pay
    /// initialization costs.
    ///
    /// # Errors
    ///
    /// Propagates any error from [`predict`](Self::predict).
    fn warm_up(&mut self) -> Result<(), InferenceError> {
        self.predict(&CellTensor::zeros()).map(|_| ())
    }
}

/// A loaded digit model shared read-only by all workers.
pub trait DigitModel: Sync {
    /// Worker-local inference state.
    type Context: InferenceContext;

    /// Create a fresh context for one worker.
    ///
    /// # Errors
    ///
    /// Returns [`ModelLoadError`] when the model cannot be instantiated.
    fn create_context(&self) -> Result<Self::Context, ModelLoadError>;
}

/// The classifier's decision thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierParams {
    /// Foreground fraction below which a cell is blank.
    pub blank_ratio: f64,
    /// Top-class probability must exceed this to be accepted.
    pub confidence_threshold: f32,
}

impl From<&PipelineConfig> for ClassifierParams {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            blank_ratio: config.blank_ratio,
            confidence_threshold: config.confidence_threshold,
        }
    }
}

/// Whether a binarized cell counts as blank.
///
/// `source` is the cell before binarization; a perfectly uniform cell has
/// no ink however Otsu splits it.
#[must_use]
pub fn is_blank(source: &GrayImage, binary: &GrayImage, blank_ratio: f64) -> bool {
    source.width() == 0
        || source.height() == 0
        || is_uniform(source)
        || foreground_ratio(binary) < blank_ratio
}

/// Crop the ink of a binary cell, pad it to a centred square and resize to
/// the model input.
///
/// # Errors
///
/// Returns [`InferenceError::EmptyCell`] when the cell has no foreground.
pub fn prepare_tensor(binary: &GrayImage) -> Result<CellTensor, InferenceError> {
    let (x0, y0, x1, y1) = foreground_bounds(binary).ok_or(InferenceError::EmptyCell)?;
    let (w, h) = (x1 - x0 + 1, y1 - y0 + 1);
    let ink = imageops::crop_imm(binary, x0, y0, w, h).to_image();

    let side = w.max(h);
    let mut square = GrayImage::new(side, side);
    imageops::replace(
        &mut square,
        &ink,
        i64::from((side - w) / 2),
        i64::from((side - h) / 2),
    );

    let resized = if side >= TENSOR_SIDE {
        imageops::thumbnail(&square, TENSOR_SIDE, TENSOR_SIDE)
    } else {
        imageops::resize(
            &square,
            TENSOR_SIDE,
            TENSOR_SIDE,
            imageops::FilterType::Triangle,
        )
    };
    CellTensor::from_image(&resized)
}

/// Decide a label from class probabilities.
///
/// The first class holding the maximum probability is taken. It is
/// accepted only if its probability is strictly greater than `threshold`;
/// otherwise the cell is blank (0).
///
/// # Errors
///
/// Returns [`InferenceError::NonFinite`] if any probability is NaN or
/// infinite.
pub fn accept(probabilities: &Probabilities, threshold: f32) -> Result<u8, InferenceError> {
    if probabilities.iter().any(|p| !p.is_finite()) {
        return Err(InferenceError::NonFinite);
    }
    let mut best = 0;
    for (class, &p) in probabilities.iter().enumerate() {
        if p > probabilities[best] {
            best = class;
        }
    }
    if probabilities[best] > threshold {
        #[allow(clippy::cast_possible_truncation)]
        Ok(best as u8)
    } else {
        Ok(0)
    }
}

/// Classify one cell image. Never fails: any inference error is logged and
/// the cell is reported blank.
pub fn classify_cell<C: InferenceContext + ?Sized>(
    context: &mut C,
    cell: &Cell,
    params: ClassifierParams,
) -> u8 {
    match try_classify(context, &cell.image, params) {
        Ok(label) => label,
        Err(e) => {
            log::warn!("cell {}: {e}; treating as blank", cell.pos);
            0
        }
    }
}

fn try_classify<C: InferenceContext + ?Sized>(
    context: &mut C,
    image: &GrayImage,
    params: ClassifierParams,
) -> Result<u8, InferenceError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(InferenceError::EmptyCell);
    }
    let binary = otsu_inverse(image);
    if is_blank(image, &binary, params.blank_ratio) {
        return Ok(0);
    }
    let tensor = prepare_tensor(&binary)?;
    let probabilities = context.predict(&tensor)?;
    accept(&probabilities, params.confidence_threshold)
}

/// Resolve a configured worker count; `0` means available parallelism.
#[must_use]
pub fn resolve_workers(workers: usize) -> usize {
    if workers > 0 {
        return workers;
    }
    std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

/// Classify every cell on a pool of `workers` threads.
///
/// Cells are dealt out in contiguous chunks, one per worker. Results come
/// back as `(position, label)` pairs; their order is unspecified.
///
/// # Errors
///
/// Returns [`PipelineError::ModelLoad`] if any worker fails to create or
/// warm up its context, and [`PipelineError::WorkerPool`] if the pool
/// cannot start. Per-cell failures are not errors.
pub fn classify_cells<M: DigitModel>(
    cells: &[Cell],
    model: &M,
    params: ClassifierParams,
    workers: usize,
) -> Result<Vec<(CellPos, u8)>, PipelineError> {
    if cells.is_empty() {
        return Ok(Vec::new());
    }
    let workers = resolve_workers(workers).min(cells.len());
    let chunk_len = cells.len().div_ceil(workers);
    log::debug!(
        "classifying {} cells on {workers} worker(s), {chunk_len} per worker",
        cells.len()
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("sudolens-classify-{i}"))
        .build()?;

    let chunks: Vec<Vec<(CellPos, u8)>> = pool.install(|| {
        cells
            .par_chunks(chunk_len)
            .map(|chunk| -> Result<Vec<(CellPos, u8)>, PipelineError> {
                let mut context = model.create_context()?;
                context
                    .warm_up()
                    .map_err(|e| ModelLoadError(format!("warm-up inference failed: {e}")))?;
                Ok(chunk
                    .iter()
                    .map(|cell| (cell.pos, classify_cell(&mut context, cell, params)))
                    .collect())
            })
            .collect::<Result<Vec<_>, _>>()
    })?;

    Ok(chunks.into_iter().flatten().collect())
}

/// Bounding box `(x0, y0, x1, y1)`, inclusive, of foreground pixels.
fn foreground_bounds(binary: &GrayImage) -> Option<(u32, u32, u32, u32)> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, &Luma([v])) in binary.enumerate_pixels() {
        if v != FOREGROUND {
            continue;
        }
        bounds = Some(bounds.map_or((x, y, x, y), |(x0, y0, x1, y1)| {
            (x0.min(x), y0.min(y), x1.max(x), y1.max(y))
        }));
    }
    bounds
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Always answers with the same probabilities.
    struct FixedModel {
        probabilities: Probabilities,
        contexts: AtomicUsize,
    }

    impl FixedModel {
        fn new(probabilities: Probabilities) -> Self {
            Self {
                probabilities,
                contexts: AtomicUsize::new(0),
            }
        }

        fn peaked(class: usize, p: f32) -> Self {
            let mut probabilities = [(1.0 - p) / 9.0; CLASS_COUNT];
            probabilities[class] = p;
            Self::new(probabilities)
        }
    }

    struct FixedContext(Probabilities);

    impl InferenceContext for FixedContext {
        fn predict(&mut self, input: &CellTensor) -> Result<Probabilities, InferenceError> {
            assert_eq!(input.as_slice().len(), CellTensor::LEN);
            Ok(self.0)
        }
    }

    impl DigitModel for FixedModel {
        type Context = FixedContext;

        fn create_context(&self) -> Result<FixedContext, ModelLoadError> {
            self.contexts.fetch_add(1, Ordering::SeqCst);
            Ok(FixedContext(self.probabilities))
        }
    }

    struct FailingContext;

    impl InferenceContext for FailingContext {
        fn predict(&mut self, _: &CellTensor) -> Result<Probabilities, InferenceError> {
            Err(InferenceError::Backend("boom".into()))
        }

        fn warm_up(&mut self) -> Result<(), InferenceError> {
            Ok(())
        }
    }

    struct UnloadableModel;

    impl DigitModel for UnloadableModel {
        type Context = FailingContext;

        fn create_context(&self) -> Result<FailingContext, ModelLoadError> {
            Err(ModelLoadError("weights missing".into()))
        }
    }

    /// Records every tensor it sees.
    struct RecordingContext<'a>(&'a Mutex<Vec<CellTensor>>);

    impl InferenceContext for RecordingContext<'_> {
        fn predict(&mut self, input: &CellTensor) -> Result<Probabilities, InferenceError> {
            self.0.lock().unwrap().push(input.clone());
            Ok([0.1; CLASS_COUNT])
        }
    }

    fn params(threshold: f32) -> ClassifierParams {
        ClassifierParams {
            blank_ratio: 0.02,
            confidence_threshold: threshold,
        }
    }

    fn white_cell() -> Cell {
        Cell {
            pos: CellPos::new(0, 0).unwrap(),
            image: GrayImage::from_pixel(42, 42, Luma([250])),
        }
    }

    /// A dark vertical bar, clearly above the blank ratio.
    fn inked_cell(row: usize, col: usize) -> Cell {
        Cell {
            pos: CellPos::new(row, col).unwrap(),
            image: GrayImage::from_fn(42, 42, |x, y| {
                if (18..24).contains(&x) && (8..34).contains(&y) {
                    Luma([20])
                } else {
                    Luma([235])
                }
            }),
        }
    }

    #[test]
    fn accept_is_strictly_greater_than_threshold() {
        let label = |p: f32| {
            let mut probs = [0.0; CLASS_COUNT];
            probs[7] = p;
            accept(&probs, 0.85).unwrap()
        };
        assert_eq!(label(0.849), 0);
        assert_eq!(label(0.85), 0);
        assert_eq!(label(0.851), 7);
    }

    #[test]
    fn accept_takes_first_of_tied_maxima() {
        let mut probs = [0.0; CLASS_COUNT];
        probs[3] = 0.5;
        probs[6] = 0.5;
        assert_eq!(accept(&probs, 0.4).unwrap(), 3);
    }

    #[test]
    fn accept_rejects_nan() {
        let mut probs = [0.0; CLASS_COUNT];
        probs[2] = f32::NAN;
        assert_eq!(accept(&probs, 0.5), Err(InferenceError::NonFinite));
    }

    #[test]
    fn uniform_cell_is_blank_without_inference() {
        let mut ctx = FailingContext;
        assert_eq!(classify_cell(&mut ctx, &white_cell(), params(0.85)), 0);
    }

    #[test]
    fn speck_below_blank_ratio_is_blank() {
        let mut image = GrayImage::from_pixel(42, 42, Luma([240]));
        // 9 dark pixels of 1764 is about 0.5%.
        for y in 20..23 {
            for x in 20..23 {
                image.put_pixel(x, y, Luma([10]));
            }
        }
        let cell = Cell {
            pos: CellPos::new(4, 4).unwrap(),
            image,
        };
        let mut ctx = FailingContext;
        assert_eq!(classify_cell(&mut ctx, &cell, params(0.85)), 0);
    }

    #[test]
    fn inference_error_becomes_blank() {
        let mut ctx = FailingContext;
        assert_eq!(classify_cell(&mut ctx, &inked_cell(2, 3), params(0.85)), 0);
    }

    #[test]
    fn confident_prediction_is_accepted() {
        let mut ctx = FixedContext(FixedModel::peaked(5, 0.97).probabilities);
        assert_eq!(classify_cell(&mut ctx, &inked_cell(0, 0), params(0.85)), 5);
        let mut unsure = FixedContext(FixedModel::peaked(5, 0.6).probabilities);
        assert_eq!(classify_cell(&mut unsure, &inked_cell(0, 0), params(0.85)), 0);
    }

    #[test]
    fn tensor_is_centred_and_normalized() {
        let seen = Mutex::new(Vec::new());
        let mut ctx = RecordingContext(&seen);
        classify_cell(&mut ctx, &inked_cell(0, 0), params(0.85));

        let tensors = seen.lock().unwrap();
        assert_eq!(tensors.len(), 1);
        let values = tensors[0].as_slice();
        assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
        // Tall bar padded left and right: centre column is ink, corners are not.
        let at = |x: usize, y: usize| values[y * 32 + x];
        assert!(at(16, 16) > 0.9);
        assert!(at(0, 0) < 0.1);
        assert!(at(31, 16) < 0.1);
    }

    #[test]
    fn prepare_tensor_rejects_empty_mask() {
        assert_eq!(
            prepare_tensor(&GrayImage::new(10, 10)),
            Err(InferenceError::EmptyCell)
        );
    }

    #[test]
    fn tensor_rejects_wrong_size() {
        assert!(matches!(
            CellTensor::from_image(&GrayImage::new(31, 32)),
            Err(InferenceError::InputShape { expected: 1024, .. })
        ));
    }

    #[test]
    fn pool_labels_every_cell_once() {
        let cells: Vec<Cell> = (0..81)
            .map(|i| {
                let pos = CellPos::from_index(i).unwrap();
                if i % 2 == 0 {
                    inked_cell(pos.row(), pos.col())
                } else {
                    Cell { pos, image: white_cell().image }
                }
            })
            .collect();
        let model = FixedModel::peaked(8, 0.99);
        let mut labels = classify_cells(&cells, &model, params(0.85), 4).unwrap();
        labels.sort_by_key(|(pos, _)| pos.index());

        assert_eq!(labels.len(), 81);
        for (i, (pos, label)) in labels.iter().enumerate() {
            assert_eq!(pos.index(), i);
            assert_eq!(*label, if i % 2 == 0 { 8 } else { 0 });
        }
        // One context per worker chunk, not per cell.
        assert_eq!(model.contexts.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn single_worker_creates_one_context() {
        let cells: Vec<Cell> = (0..9).map(|c| inked_cell(0, c)).collect();
        let model = FixedModel::peaked(1, 0.9);
        let labels = classify_cells(&cells, &model, params(0.85), 1).unwrap();
        assert_eq!(labels.len(), 9);
        assert_eq!(model.contexts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unloadable_model_is_fatal() {
        let cells = vec![inked_cell(0, 0)];
        assert!(matches!(
            classify_cells(&cells, &UnloadableModel, params(0.85), 2),
            Err(PipelineError::ModelLoad(_))
        ));
    }

    #[test]
    fn no_cells_no_work() {
        let model = FixedModel::peaked(1, 0.9);
        assert!(classify_cells(&[], &model, params(0.85), 0).unwrap().is_empty());
        assert_eq!(model.contexts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn zero_workers_resolves_to_available_parallelism() {
        assert!(resolve_workers(0) >= 1);
        assert_eq!(resolve_workers(3), 3);
    }
}
