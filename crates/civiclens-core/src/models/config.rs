//! Configuration structures for the report pipeline.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::classify::DEFAULT_ALLOWED_CATEGORIES;
use crate::dedup::MAX_WINDOW_DAYS;
use crate::routing::{DEFAULT_DEPARTMENT, DEPT_ROADS, DEPT_SANITATION};

/// Main configuration for civiclens.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CivicConfig {
    /// Issue detector configuration.
    pub detection: DetectionConfig,

    /// Duplicate window configuration.
    pub dedup: DedupConfig,

    /// Reverse geocoding configuration.
    pub geocoding: GeocodingConfig,

    /// Department routing table.
    pub routing: RoutingConfig,

    /// Report store configuration.
    pub store: StoreConfig,

    /// Nearby reports query configuration.
    pub nearby: NearbyConfig,
}

/// Issue detector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Path to the YOLO ONNX model.
    pub model_path: PathBuf,

    /// Class names in model output order.
    pub labels: Vec<String>,

    /// Minimum box confidence kept by the detector (0.0 - 1.0).
    pub confidence_threshold: f32,

    /// IoU above which overlapping same-class boxes are suppressed.
    pub iou_threshold: f32,

    /// Square model input size in pixels.
    pub input_size: u32,

    /// Categories the pipeline knows how to route.
    pub allowed_categories: Vec<String>,

    /// Number of CPU threads for inference.
    pub num_threads: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/best.onnx"),
            labels: DEFAULT_ALLOWED_CATEGORIES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            confidence_threshold: 0.25,
            iou_threshold: 0.7,
            input_size: 640,
            allowed_categories: DEFAULT_ALLOWED_CATEGORIES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            num_threads: 4,
        }
    }
}

/// Duplicate window: same category, recent and close by.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// How far back to look for an existing report, in days.
    pub window_days: i64,

    /// Maximum distance in meters (inclusive) for a duplicate.
    pub radius_meters: f64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            window_days: 7,
            radius_meters: 100.0,
        }
    }
}

/// Reverse geocoding service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    /// Nominatim base URL.
    pub base_url: String,

    /// User-Agent sent with every lookup (required by Nominatim's usage policy).
    pub user_agent: String,

    /// Upper bound on a single lookup, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: "CivicLens_Project_v1".to_string(),
            timeout_ms: 10_000,
        }
    }
}

/// Category to department routing table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Department name mapped to the categories it handles.
    pub departments: BTreeMap<String, Vec<String>>,

    /// Department for categories not listed above.
    pub default_department: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        let mut departments = BTreeMap::new();
        departments.insert(
            DEPT_ROADS.to_string(),
            vec!["pothole".to_string(), "major_crack".to_string()],
        );
        departments.insert(
            DEPT_SANITATION.to_string(),
            vec![
                "overflowing".to_string(),
                "garbage_pile".to_string(),
                "full".to_string(),
            ],
        );
        Self {
            departments,
            default_department: DEFAULT_DEPARTMENT.to_string(),
        }
    }
}

/// Report store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON file holding all reports.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("reports.json"),
        }
    }
}

/// Nearby reports query configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NearbyConfig {
    /// Radius used when the caller gives none, in meters.
    pub default_radius_meters: f64,
}

impl Default for NearbyConfig {
    fn default() -> Self {
        Self {
            default_radius_meters: crate::nearby::DEFAULT_NEARBY_RADIUS_METERS,
        }
    }
}

impl CivicConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, content)
    }

    /// Check values that would make the pipeline misbehave.
    pub fn validate(&self) -> crate::Result<()> {
        let threshold = self.detection.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(crate::CivicError::Config(format!(
                "detection.confidence_threshold must be within 0..=1, got {}",
                threshold
            )));
        }
        if self.detection.labels.is_empty() {
            return Err(crate::CivicError::Config(
                "detection.labels must not be empty".to_string(),
            ));
        }
        if !(0..=MAX_WINDOW_DAYS).contains(&self.dedup.window_days) {
            return Err(crate::CivicError::Config(format!(
                "dedup.window_days must be within 0..={}, got {}",
                MAX_WINDOW_DAYS, self.dedup.window_days
            )));
        }
        if !(self.dedup.radius_meters >= 0.0) {
            return Err(crate::CivicError::Config(
                "dedup.radius_meters must be non-negative".to_string(),
            ));
        }
        if self.routing.default_department.trim().is_empty() {
            return Err(crate::CivicError::Config(
                "routing.default_department must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
