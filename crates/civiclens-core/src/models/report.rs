//! Persisted civic issue report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;

/// Workflow label given to every freshly created report.
pub const DEFAULT_STATUS: &str = "Submitted";

/// A persisted civic issue report.
///
/// `department` and the location fields are written once, when the pipeline
/// creates the report. Only `status` changes afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Short store-generated identifier.
    pub id: String,

    /// Detected issue category (e.g. `pothole`).
    pub category: String,

    /// Latitude in WGS84 degrees.
    pub latitude: f64,

    /// Longitude in WGS84 degrees.
    pub longitude: f64,

    /// Department the report was routed to.
    pub department: String,

    /// Creation instant.
    pub timestamp: DateTime<Utc>,

    /// Free-form workflow label.
    pub status: String,

    /// Link to the stored image, if any.
    #[serde(default)]
    pub image_url: Option<String>,

    /// Human-readable address.
    #[serde(default)]
    pub address: Option<String>,

    /// City, town, village or county.
    #[serde(default)]
    pub city: Option<String>,

    /// State or region.
    #[serde(default)]
    pub state: Option<String>,
}

impl Report {
    /// Build a report from an insert payload.
    pub fn from_new(new: NewReport, id: String, timestamp: DateTime<Utc>) -> Self {
        Self {
            id,
            category: new.category,
            latitude: new.latitude,
            longitude: new.longitude,
            department: new.department,
            timestamp,
            status: DEFAULT_STATUS.to_string(),
            image_url: new.image_url,
            address: new.address,
            city: new.city,
            state: new.state,
        }
    }

    /// Report coordinates.
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// Insert payload for a new report; the store assigns id, timestamp and status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReport {
    pub category: String,
    pub latitude: f64,
    pub longitude: f64,
    pub department: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

/// Generate a short report id: the first 8 hex digits of a v4 UUID.
pub fn generate_report_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}
