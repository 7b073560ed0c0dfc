//! ONNX Runtime classifier backend.

use std::path::Path;
use std::sync::Mutex;

use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;

use super::{ClassifierModel, ImageTensor, ModelError};

/// Image classifier backed by an ONNX Runtime session.
///
/// `Session::run` requires `&mut self`, while `ClassifierModel` is shared
/// behind `&self` across request threads, hence the `Mutex`.
pub struct OnnxClassifier {
    name: String,
    session: Mutex<Session>,
}

impl OnnxClassifier {
    /// Load a model file and build a session with `intra_threads` workers.
    pub fn load(name: &str, model_path: &Path, intra_threads: usize) -> Result<Self, ModelError> {
        if !model_path.exists() {
            return Err(ModelError::NotFound(model_path.to_path_buf()));
        }

        let session = Session::builder()
            .map_err(|e| ModelError::Init(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| ModelError::Init(e.to_string()))?
            .with_intra_threads(intra_threads)
            .map_err(|e| ModelError::Init(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| ModelError::Init(format!("ONNX load failed: {e}")))?;

        tracing::info!(
            model = %name,
            path = %model_path.display(),
            threads = intra_threads,
            "ONNX classifier loaded"
        );

        Ok(Self {
            name: name.to_string(),
            session: Mutex::new(session),
        })
    }
}

impl ClassifierModel for OnnxClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict(&self, input: &ImageTensor) -> Result<Vec<f32>, ModelError> {
        let tensor = TensorRef::from_array_view(input)
            .map_err(|e| ModelError::Inference(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| ModelError::Inference("Session lock poisoned".to_string()))?;

        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| ModelError::Inference(format!("ONNX inference failed: {e}")))?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::Inference(format!("Output extraction: {e}")))?;

        // Classifier heads are [batch, classes]; take the single batch row.
        if shape.len() != 2 || shape[0] != 1 {
            return Err(ModelError::Shape(format!(
                "{}: expected output [1, classes], got {shape:?}",
                self.name
            )));
        }

        Ok(data.to_vec())
    }
}
