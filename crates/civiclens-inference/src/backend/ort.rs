//! ONNX Runtime backend with the XNNPACK execution provider.

use std::path::Path;
use std::sync::Mutex;

use ndarray::{ArrayD, IxDyn};
use ort::ep::XNNPACK;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::{Session, SessionInputValue};
use ort::value::Tensor;
use tracing::{debug, info};

use crate::error::InferenceError;
use crate::tensor::{InputTensor, OutputTensor};
use crate::{InferenceBackend, Result};

/// A loaded ONNX model.
///
/// ONNX Runtime sessions need `&mut` to run, so the session sits behind a
/// mutex and concurrent submissions take turns on the model.
pub struct OrtBackend {
    session: Mutex<Session>,
    input_names: Vec<String>,
    output_names: Vec<String>,
}

impl OrtBackend {
    /// Load the model at `path`, running with `threads` intra-op threads.
    pub fn from_file<P: AsRef<Path>>(path: P, threads: usize) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| InferenceError::ModelRead {
            path: path.to_path_buf(),
            source,
        })?;

        let backend = Self::from_bytes(&bytes, threads)?;
        info!(
            model = %path.display(),
            inputs = ?backend.input_names,
            outputs = ?backend.output_names,
            "ONNX model loaded"
        );
        Ok(backend)
    }

    /// Load a model held in memory.
    pub fn from_bytes(bytes: &[u8], threads: usize) -> Result<Self> {
        let session = Session::builder()
            .map_err(|e| InferenceError::RuntimeSetup(e.to_string()))?
            .with_execution_providers([XNNPACK::default().build()])
            .map_err(|e| InferenceError::RuntimeSetup(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| InferenceError::RuntimeSetup(e.to_string()))?
            .with_intra_threads(threads.max(1))
            .map_err(|e| InferenceError::RuntimeSetup(e.to_string()))?
            .commit_from_memory(bytes)
            .map_err(|e| InferenceError::InvalidModel(e.to_string()))?;

        let input_names = session
            .inputs()
            .iter()
            .map(|i| i.name().to_string())
            .collect();
        let output_names = session
            .outputs()
            .iter()
            .map(|o| o.name().to_string())
            .collect();

        Ok(Self {
            session: Mutex::new(session),
            input_names,
            output_names,
        })
    }

    fn to_session_input(&self, name: &str, tensor: &InputTensor) -> Result<SessionInputValue<'static>> {
        if !self.input_names.iter().any(|n| n == name) {
            return Err(InferenceError::InputMismatch(format!(
                "model has no input named '{}' (expected one of {:?})",
                name, self.input_names
            )));
        }

        let shape: Vec<i64> = tensor.shape().iter().map(|&d| d as i64).collect();
        let InputTensor::Float32(arr) = tensor;
        let data: Vec<f32> = arr.iter().copied().collect();

        Tensor::from_array((shape, data))
            .map(Into::into)
            .map_err(|e| InferenceError::InputMismatch(e.to_string()))
    }
}

/// Copy an ONNX output of element type `T` into an owned array.
fn owned_array<T: Clone>(dims: Vec<usize>, data: &[T]) -> Result<ArrayD<T>> {
    ArrayD::from_shape_vec(IxDyn(&dims), data.to_vec())
        .map_err(|e| InferenceError::UnsupportedOutput(e.to_string()))
}

impl InferenceBackend for OrtBackend {
    fn run(&self, inputs: &[(&str, InputTensor)]) -> Result<Vec<(String, OutputTensor)>> {
        let session_inputs = inputs
            .iter()
            .map(|(name, tensor)| Ok((*name, self.to_session_input(name, tensor)?)))
            .collect::<Result<Vec<_>>>()?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| InferenceError::RunFailed("model session poisoned".to_string()))?;

        let outputs = session
            .run(session_inputs)
            .map_err(|e| InferenceError::RunFailed(e.to_string()))?;

        let mut extracted = Vec::with_capacity(outputs.len());
        for (name, value) in outputs.iter() {
            let tensor = if let Ok((shape, data)) = value.try_extract_tensor::<f32>() {
                let dims = shape.iter().map(|&d| d.max(0) as usize).collect();
                OutputTensor::Float32(owned_array(dims, data)?)
            } else if let Ok((shape, data)) = value.try_extract_tensor::<i64>() {
                let dims = shape.iter().map(|&d| d.max(0) as usize).collect();
                OutputTensor::Int64(owned_array(dims, data)?)
            } else {
                return Err(InferenceError::UnsupportedOutput(format!(
                    "output '{}' is neither f32 nor i64",
                    name
                )));
            };
            extracted.push((name.to_string(), tensor));
        }

        debug!(outputs = extracted.len(), "inference finished");
        Ok(extracted)
    }

    fn input_names(&self) -> &[String] {
        &self.input_names
    }
}
