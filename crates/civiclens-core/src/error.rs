//! Error types for the civiclens-core library.

use thiserror::Error;

/// Main error type for report submission.
///
/// Only detector failures and store failures reach the caller. A submission
/// without a recognised issue is a `Rejected` outcome, and enrichment problems
/// are absorbed by the enricher.
#[derive(Error, Debug)]
pub enum CivicError {
    /// The detector could not produce a classification.
    #[error("classification unavailable: {0}")]
    ClassificationUnavailable(#[from] ClassificationError),

    /// The report store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors raised while turning an image into candidate detections.
#[derive(Error, Debug)]
pub enum ClassificationError {
    /// No model is loaded.
    #[error("detector unavailable: {0}")]
    DetectorUnavailable(String),

    /// The submitted bytes are not a decodable image.
    #[error("unreadable image: {0}")]
    UnreadableImage(String),

    /// The model ran but its output could not be used.
    #[error("detection failed: {0}")]
    Inference(String),
}

/// Errors raised by a report store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No report with the given id.
    #[error("report not found: {0}")]
    NotFound(String),

    /// I/O error on a file-backed store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data could not be (de)serialised.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Any other backend failure.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Errors raised by a reverse geocoder.
///
/// These never leave the enricher; see [`crate::enrich::Enrichment`].
#[derive(Error, Debug)]
pub enum GeocodeError {
    /// The request could not be sent or the response not read.
    #[error("geocoder transport error: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("geocoder returned status {0}")]
    Status(u16),

    /// The response body was not the expected shape.
    #[error("malformed geocoder response: {0}")]
    Malformed(String),
}

/// Result type for the civiclens library.
pub type Result<T> = std::result::Result<T, CivicError>;
