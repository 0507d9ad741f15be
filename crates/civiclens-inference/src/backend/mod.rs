//! Inference backend implementations.

#[cfg(feature = "native")]
pub mod ort;

use crate::{InputTensor, OutputTensor, Result};

/// Trait for ONNX inference backends.
///
/// A backend is loaded once and shared by every submission, so `run` takes
/// `&self` and implementations handle their own interior locking.
pub trait InferenceBackend: Send + Sync {
    /// Run inference with the given named inputs and return named outputs.
    fn run(&self, inputs: &[(&str, InputTensor)]) -> Result<Vec<(String, OutputTensor)>>;

    /// Get the input names expected by the model.
    fn input_names(&self) -> &[String];
}
