//! Turning raw detector output into a single issue decision.
//!
//! The detector returns every box it found above its confidence threshold.
//! [`select_issue`] reduces that list to the one issue the pipeline can route,
//! or [`Classification::NoIssue`] when nothing routable was seen. A detector
//! that cannot run at all is a [`ClassificationError`], never `NoIssue`.

mod preprocessing;
pub mod yolo;

pub use preprocessing::{Letterbox, LetterboxPreprocessor};
pub use yolo::{DetectedBox, YoloDetector};

#[cfg(feature = "native")]
pub use yolo::load_detector;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ClassificationError;

/// Categories the pipeline knows how to route.
pub const DEFAULT_ALLOWED_CATEGORIES: [&str; 4] = ["pothole", "overflowing", "garbage_pile", "full"];

/// Confidence threshold passed to the detector when none is configured.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;

/// One detector output box, reduced to its label and score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateDetection {
    /// Raw class name from the model.
    pub label: String,
    /// Confidence score (0.0 - 1.0).
    pub confidence: f32,
}

impl CandidateDetection {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Outcome of classifying one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classification {
    /// A routable issue was found.
    Issue { category: String, confidence: f32 },
    /// No allow-listed category was detected.
    NoIssue,
}

impl Classification {
    /// Detected category, if any.
    pub fn category(&self) -> Option<&str> {
        match self {
            Classification::Issue { category, .. } => Some(category),
            Classification::NoIssue => None,
        }
    }
}

/// Pick the allow-listed candidate with the highest confidence.
///
/// Candidates are scanned in order and a later one only wins with a strictly
/// greater confidence, so ties keep the first seen.
pub fn select_issue<S: AsRef<str>>(
    candidates: &[CandidateDetection],
    allow_list: &[S],
) -> Classification {
    let mut best: Option<&CandidateDetection> = None;

    for candidate in candidates {
        if !allow_list.iter().any(|c| c.as_ref() == candidate.label) {
            continue;
        }
        match best {
            Some(current) if candidate.confidence <= current.confidence => {}
            _ => best = Some(candidate),
        }
    }

    match best {
        Some(c) => Classification::Issue {
            category: c.label.clone(),
            confidence: c.confidence,
        },
        None => Classification::NoIssue,
    }
}

/// An image detector returning labeled, scored boxes.
pub trait Detector: Send + Sync {
    /// Detect issues in encoded image bytes, keeping boxes scoring strictly
    /// above `confidence_threshold`.
    fn predict(
        &self,
        image: &[u8],
        confidence_threshold: f32,
    ) -> Result<Vec<CandidateDetection>, ClassificationError>;
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn predict(
        &self,
        image: &[u8],
        confidence_threshold: f32,
    ) -> Result<Vec<CandidateDetection>, ClassificationError> {
        (**self).predict(image, confidence_threshold)
    }
}

/// Whether a detector was successfully loaded.
#[derive(Debug)]
pub enum DetectorState<D> {
    /// The model is loaded and can serve requests.
    Ready(D),
    /// The model could not be loaded; every classification fails.
    Unavailable { reason: String },
}

impl<D> DetectorState<D> {
    /// Mark the detector as unavailable.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        DetectorState::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, DetectorState::Ready(_))
    }

    /// Borrow the detector or fail with the recorded reason.
    pub fn get(&self) -> Result<&D, ClassificationError> {
        match self {
            DetectorState::Ready(detector) => Ok(detector),
            DetectorState::Unavailable { reason } => {
                Err(ClassificationError::DetectorUnavailable(reason.clone()))
            }
        }
    }
}

/// Runs the detector and reduces its output to a [`Classification`].
pub struct ClassifierAdapter<D> {
    detector: DetectorState<D>,
    allow_list: Vec<String>,
    confidence_threshold: f32,
}

impl<D: Detector> ClassifierAdapter<D> {
    /// Create an adapter with the default allow-list and threshold.
    pub fn new(detector: DetectorState<D>) -> Self {
        Self {
            detector,
            allow_list: DEFAULT_ALLOWED_CATEGORIES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }

    /// Replace the allow-list.
    pub fn with_allow_list(mut self, allow_list: Vec<String>) -> Self {
        self.allow_list = allow_list;
        self
    }

    /// Set the detector confidence threshold.
    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn is_ready(&self) -> bool {
        self.detector.is_ready()
    }

    pub fn allow_list(&self) -> &[String] {
        &self.allow_list
    }

    /// Classify encoded image bytes.
    pub fn classify(&self, image: &[u8]) -> Result<Classification, ClassificationError> {
        let detector = self.detector.get()?;
        let candidates = detector.predict(image, self.confidence_threshold)?;

        debug!(candidates = candidates.len(), "detector returned candidates");

        let classification = select_issue(&candidates, &self.allow_list);
        match &classification {
            Classification::Issue {
                category,
                confidence,
            } => info!(%category, confidence, "issue detected"),
            Classification::NoIssue => info!("no routable issue detected"),
        }

        Ok(classification)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Detector returning a fixed candidate list, or a fixed failure.
    pub struct FixedDetector {
        pub candidates: Vec<CandidateDetection>,
        pub fail_unreadable: bool,
    }

    impl FixedDetector {
        pub fn returning(candidates: &[(&str, f32)]) -> Self {
            Self {
                candidates: candidates
                    .iter()
                    .map(|(label, conf)| CandidateDetection::new(*label, *conf))
                    .collect(),
                fail_unreadable: false,
            }
        }

        pub fn unreadable() -> Self {
            Self {
                candidates: Vec::new(),
                fail_unreadable: true,
            }
        }
    }

    impl Detector for FixedDetector {
        fn predict(
            &self,
            _image: &[u8],
            confidence_threshold: f32,
        ) -> Result<Vec<CandidateDetection>, ClassificationError> {
            if self.fail_unreadable {
                return Err(ClassificationError::UnreadableImage(
                    "not an image".to_string(),
                ));
            }
            Ok(self
                .candidates
                .iter()
                .filter(|c| c.confidence > confidence_threshold)
                .cloned()
                .collect())
        }
    }

    fn candidates(items: &[(&str, f32)]) -> Vec<CandidateDetection> {
        items
            .iter()
            .map(|(label, conf)| CandidateDetection::new(*label, *conf))
            .collect()
    }

    #[test]
    fn test_allow_list_excludes_higher_scoring_label() {
        let result = select_issue(
            &candidates(&[("pothole", 0.3), ("dog", 0.9), ("pothole", 0.6)]),
            &DEFAULT_ALLOWED_CATEGORIES,
        );
        assert_eq!(
            result,
            Classification::Issue {
                category: "pothole".to_string(),
                confidence: 0.6
            }
        );
    }

    #[test]
    fn test_only_unknown_labels_is_no_issue() {
        let result = select_issue(&candidates(&[("dog", 0.9)]), &DEFAULT_ALLOWED_CATEGORIES);
        assert_eq!(result, Classification::NoIssue);
    }

    #[test]
    fn test_zero_candidates_is_no_issue() {
        let result = select_issue(&[], &DEFAULT_ALLOWED_CATEGORIES);
        assert_eq!(result, Classification::NoIssue);
    }

    #[test]
    fn test_tie_keeps_first_seen() {
        let result = select_issue(
            &candidates(&[("overflowing", 0.5), ("full", 0.5)]),
            &DEFAULT_ALLOWED_CATEGORIES,
        );
        assert_eq!(result.category(), Some("overflowing"));

        let result = select_issue(
            &candidates(&[("pothole", 0.5), ("pothole", 0.5)]),
            &DEFAULT_ALLOWED_CATEGORIES,
        );
        assert_eq!(
            result,
            Classification::Issue {
                category: "pothole".to_string(),
                confidence: 0.5
            }
        );
    }

    #[test]
    fn test_custom_allow_list() {
        let result = select_issue(&candidates(&[("dog", 0.9), ("pothole", 0.8)]), &["dog"]);
        assert_eq!(result.category(), Some("dog"));
    }

    #[test]
    fn test_adapter_applies_threshold_upstream() {
        let adapter = ClassifierAdapter::new(DetectorState::Ready(FixedDetector::returning(&[
            ("pothole", 0.2),
            ("full", 0.4),
        ])));
        let result = adapter.classify(b"img").unwrap();
        assert_eq!(result.category(), Some("full"));
    }

    #[test]
    fn test_adapter_drops_score_at_threshold() {
        let adapter = ClassifierAdapter::new(DetectorState::Ready(FixedDetector::returning(&[
            ("pothole", 0.25),
        ])))
        .with_confidence_threshold(0.25);
        assert_eq!(adapter.classify(b"img").unwrap(), Classification::NoIssue);
    }

    #[test]
    fn test_unavailable_detector_is_error_not_no_issue() {
        let adapter: ClassifierAdapter<FixedDetector> =
            ClassifierAdapter::new(DetectorState::unavailable("model file missing"));
        assert!(!adapter.is_ready());
        let err = adapter.classify(b"img").unwrap_err();
        assert!(matches!(err, ClassificationError::DetectorUnavailable(_)));
    }

    #[test]
    fn test_unreadable_image_is_error() {
        let adapter = ClassifierAdapter::new(DetectorState::Ready(FixedDetector::unreadable()));
        let err = adapter.classify(b"garbage").unwrap_err();
        assert!(matches!(err, ClassificationError::UnreadableImage(_)));
    }
}
