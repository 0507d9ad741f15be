//! Error types for the inference layer.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading or running a detection model.
#[derive(Error, Debug)]
pub enum InferenceError {
    /// The model file is missing or unreadable.
    #[error("cannot read model file {}: {source}", path.display())]
    ModelRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// ONNX Runtime rejected the session options (execution provider, threads).
    #[error("ONNX Runtime setup failed: {0}")]
    RuntimeSetup(String),

    /// The bytes are not a loadable ONNX graph.
    #[error("not a usable ONNX model: {0}")]
    InvalidModel(String),

    /// An input name or tensor does not fit the model's inputs.
    #[error("input does not match model: {0}")]
    InputMismatch(String),

    /// The forward pass failed.
    #[error("forward pass failed: {0}")]
    RunFailed(String),

    /// An output tensor had an element type or shape the detector cannot read.
    #[error("unsupported model output: {0}")]
    UnsupportedOutput(String),
}
