//! ONNX digit model run through ONNX Runtime.
//!
//! The network takes one 32×32 single-channel cell as an NHWC
//! `[1, 32, 32, 1]` float tensor and yields ten class scores. A dynamic
//! batch dimension (`-1`) is accepted; every other dimension must match.
//! Scores that already form a probability distribution are used as-is,
//! anything else is treated as logits and passed through softmax.
//!
//! The model bytes are held in memory and every worker context commits
//! its own [`Session`], so workers never contend on a shared session.

use std::sync::Arc;

use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::tensor::TensorElementType;
use ort::value::{TensorRef, ValueType};

use crate::classify::{
    CLASS_COUNT, CellTensor, DigitModel, InferenceContext, InferenceError, Probabilities,
    TENSOR_SIDE,
};
use crate::types::ModelLoadError;

/// Input shape the network must declare, NHWC.
#[allow(clippy::cast_lossless)]
pub const INPUT_SHAPE: [i64; 4] = [1, TENSOR_SIDE as i64, TENSOR_SIDE as i64, 1];

/// Probability sums further than this from 1 mark the output as logits.
const DISTRIBUTION_TOLERANCE: f32 = 1e-3;

/// A validated ONNX digit classifier, cheap to clone and share.
#[derive(Debug, Clone)]
pub struct OnnxModel {
    bytes: Arc<[u8]>,
}

impl OnnxModel {
    /// Load a model from the bytes of an `.onnx` file.
    ///
    /// One session is built up front to check the graph's signature and
    /// then dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ModelLoadError`] if ONNX Runtime rejects the bytes, the
    /// graph does not take a single `[1, 32, 32, 1]` float input, or its
    /// first output does not hold ten classes.
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Result<Self, ModelLoadError> {
        let bytes = bytes.into();
        let session = commit(&bytes)?;

        let [input] = session.inputs.as_slice() else {
            return Err(ModelLoadError(format!(
                "model has {} inputs, expected 1",
                session.inputs.len()
            )));
        };
        check_input(&input.input_type)?;

        let output = session
            .outputs
            .first()
            .ok_or_else(|| ModelLoadError("model has no outputs".into()))?;
        check_output(&output.output_type)?;

        log::debug!(
            "loaded onnx model: input {:?} -> output {:?} ({} bytes)",
            input.name,
            output.name,
            bytes.len()
        );
        Ok(Self { bytes })
    }
}

fn commit(bytes: &[u8]) -> Result<Session, ModelLoadError> {
    Session::builder()
        .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level1))
        .and_then(|b| b.with_intra_threads(1))
        .and_then(|b| b.commit_from_memory(bytes))
        .map_err(|e| ModelLoadError(e.to_string()))
}

fn check_input(input: &ValueType) -> Result<(), ModelLoadError> {
    match input {
        ValueType::Tensor { ty, shape, .. } => check_input_shape(*ty, shape),
        other => Err(ModelLoadError(format!("model input is {other}, expected a tensor"))),
    }
}

fn check_output(output: &ValueType) -> Result<(), ModelLoadError> {
    match output {
        ValueType::Tensor { ty, shape, .. } => check_output_shape(*ty, shape),
        other => Err(ModelLoadError(format!("model output is {other}, expected a tensor"))),
    }
}

/// The input must be `f32` with dimensions [`INPUT_SHAPE`]; only the batch
/// dimension may be dynamic.
fn check_input_shape(ty: TensorElementType, dims: &[i64]) -> Result<(), ModelLoadError> {
    if ty != TensorElementType::Float32 {
        return Err(ModelLoadError(format!("model input is {ty}, expected f32")));
    }
    let matches = dims.len() == INPUT_SHAPE.len()
        && (dims[0] == -1 || dims[0] == INPUT_SHAPE[0])
        && dims[1..] == INPUT_SHAPE[1..];
    if matches {
        Ok(())
    } else {
        Err(ModelLoadError(format!(
            "model input shape is {dims:?}, expected {INPUT_SHAPE:?}"
        )))
    }
}

/// The output must be `f32` with ten classes in its last dimension and
/// nothing but (possibly dynamic) unit dimensions before it.
fn check_output_shape(ty: TensorElementType, dims: &[i64]) -> Result<(), ModelLoadError> {
    if ty != TensorElementType::Float32 {
        return Err(ModelLoadError(format!("model output is {ty}, expected f32")));
    }
    #[allow(clippy::cast_possible_wrap)]
    let classes = dims.last() == Some(&(CLASS_COUNT as i64));
    let leading_unit = dims
        .iter()
        .rev()
        .skip(1)
        .all(|&d| d == 1 || d == -1);
    if classes && leading_unit {
        Ok(())
    } else {
        Err(ModelLoadError(format!(
            "model output shape is {dims:?}, expected [1, {CLASS_COUNT}]"
        )))
    }
}

/// Turn raw network output into class probabilities.
fn probabilities_from_output(values: &[f32]) -> Result<Probabilities, InferenceError> {
    let mut probabilities: Probabilities =
        values.try_into().map_err(|_| InferenceError::InputShape {
            expected: CLASS_COUNT,
            found: values.len(),
        })?;
    if probabilities.iter().any(|p| !p.is_finite()) {
        return Err(InferenceError::NonFinite);
    }
    let total: f32 = probabilities.iter().sum();
    let is_distribution = probabilities.iter().all(|&p| (0.0..=1.0).contains(&p))
        && (total - 1.0).abs() <= DISTRIBUTION_TOLERANCE;
    if !is_distribution {
        softmax(&mut probabilities);
    }
    Ok(probabilities)
}

fn softmax(values: &mut [f32]) {
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut total = 0.0;
    for v in values.iter_mut() {
        *v = (*v - max).exp();
        total += *v;
    }
    if total > 0.0 {
        for v in values.iter_mut() {
            *v /= total;
        }
    }
}

/// Worker-local ONNX Runtime session.
pub struct OnnxContext {
    session: Session,
}

impl InferenceContext for OnnxContext {
    fn predict(&mut self, input: &CellTensor) -> Result<Probabilities, InferenceError> {
        let values = input.as_slice();
        if values.len() != CellTensor::LEN {
            return Err(InferenceError::InputShape {
                expected: CellTensor::LEN,
                found: values.len(),
            });
        }

        let side = TENSOR_SIDE as usize;
        let tensor = TensorRef::from_array_view(([1usize, side, side, 1], values))
            .map_err(|e| InferenceError::Backend(e.to_string()))?;
        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .map_err(|e| InferenceError::Backend(e.to_string()))?;
        let (_, scores) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::Backend(e.to_string()))?;
        probabilities_from_output(scores)
    }
}

impl DigitModel for OnnxModel {
    type Context = OnnxContext;

    fn create_context(&self) -> Result<OnnxContext, ModelLoadError> {
        Ok(OnnxContext {
            session: commit(&self.bytes)?,
        })
    }
}
