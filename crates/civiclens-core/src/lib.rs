//! Core library for civic issue reports.
//!
//! This crate provides:
//! - Issue detection from photos (YOLO over ONNX) reduced to one routable category
//! - Duplicate suppression by category, time window and distance
//! - Department routing
//! - Reverse-geocoding enrichment with a non-fatal fallback
//! - Report stores (in-memory and JSON file) and the public nearby query

pub mod classify;
pub mod dedup;
pub mod enrich;
pub mod error;
pub mod geo;
pub mod models;
pub mod nearby;
pub mod pipeline;
pub mod routing;
pub mod store;

pub use classify::{
    select_issue, CandidateDetection, Classification, ClassifierAdapter, Detector, DetectorState,
    YoloDetector,
};
#[cfg(feature = "native")]
pub use classify::load_detector;
pub use dedup::DuplicateDetector;
pub use enrich::{Enrichment, Geocoder, Location, LocationEnricher, NominatimGeocoder, NoopGeocoder};
pub use error::{CivicError, ClassificationError, GeocodeError, Result, StoreError};
pub use geo::{distance, GeoPoint};
pub use models::{CivicConfig, NewReport, Report};
pub use nearby::nearby_reports;
pub use pipeline::{LocationSummary, ReportPipeline, SubmissionOutcome};
pub use routing::{assign_department, DepartmentRouter};
pub use store::{JsonFileStore, MemoryStore, ReportStore};

/// Re-export inference types.
pub use civiclens_inference::{InferenceBackend, InputTensor, OutputTensor};

#[cfg(feature = "native")]
pub use civiclens_inference::OrtBackend;
