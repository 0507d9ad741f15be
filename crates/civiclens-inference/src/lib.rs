//! ONNX inference layer for civiclens.
//!
//! The issue detector only talks to [`InferenceBackend`]; the native build
//! provides [`OrtBackend`] (ONNX Runtime with XNNPACK), tests provide their own.

mod backend;
mod error;
mod tensor;

pub use backend::InferenceBackend;
pub use error::InferenceError;
pub use tensor::{InputTensor, OutputTensor};

#[cfg(feature = "native")]
pub use backend::ort::OrtBackend;

/// Result type for inference operations.
pub type Result<T> = std::result::Result<T, InferenceError>;
