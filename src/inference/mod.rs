//! Model inference seam.
//!
//! Every classifier in the pipeline (gatekeeper and specialists) sits behind
//! `ClassifierModel`. The production backend is ONNX Runtime (behind the
//! `onnx` feature); `StaticModel` is a deterministic in-process stand-in used
//! by tests and local wiring.

pub mod loading;
#[cfg(feature = "onnx")]
pub mod onnx;

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::Array4;
use thiserror::Error;

pub use loading::{LoadingProfile, ModelCatalog, ModelRole, ModelSpec, ReconstructionPolicy};
#[cfg(feature = "onnx")]
pub use onnx::OnnxClassifier;

/// Model-ready input: `(batch, height, width, channels)`, NHWC layout.
pub type ImageTensor = Array4<f32>;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Model initialization: {0}")]
    Init(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Unexpected tensor shape: {0}")]
    Shape(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),
}

/// A classifier that maps one image tensor to one score vector.
///
/// Implementations must be shareable across request threads; any interior
/// state needed to run (e.g. an ONNX session) is synchronised internally.
pub trait ClassifierModel: Send + Sync {
    /// Short name used in log events.
    fn name(&self) -> &str;

    /// Run the model on a batch of one and return the first row of output.
    fn predict(&self, input: &ImageTensor) -> Result<Vec<f32>, ModelError>;
}

/// Deterministic model returning a fixed score vector.
///
/// Validates the input shape like a real session would, and counts calls so
/// tests can assert a model was (or was not) reached.
pub struct StaticModel {
    name: String,
    expected_shape: Option<[usize; 4]>,
    scores: Vec<f32>,
    calls: AtomicUsize,
}

impl StaticModel {
    pub fn new(name: impl Into<String>, scores: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            expected_shape: None,
            scores,
            calls: AtomicUsize::new(0),
        }
    }

    /// Reject inputs whose shape differs from `shape`.
    pub fn with_input_shape(mut self, shape: [usize; 4]) -> Self {
        self.expected_shape = Some(shape);
        self
    }

    /// Number of `predict` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ClassifierModel for StaticModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict(&self, input: &ImageTensor) -> Result<Vec<f32>, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(expected) = self.expected_shape {
            if input.shape() != expected {
                return Err(ModelError::Shape(format!(
                    "{} expects {:?}, got {:?}",
                    self.name,
                    expected,
                    input.shape()
                )));
            }
        }
        Ok(self.scores.clone())
    }
}

/// Model that always fails, for exercising error paths.
pub struct FailingModel {
    message: String,
}

impl FailingModel {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl ClassifierModel for FailingModel {
    fn name(&self) -> &str {
        "failing"
    }

    fn predict(&self, _input: &ImageTensor) -> Result<Vec<f32>, ModelError> {
        Err(ModelError::Inference(self.message.clone()))
    }
}
