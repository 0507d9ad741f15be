//! Duplicate detection against recent nearby reports.
//!
//! A submission duplicates an existing report when both share a category, the
//! existing one was created within the window, and the two are at most
//! `radius_meters` apart. Candidates are scanned in store order and the first
//! match wins; the closest match is not searched for.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::error::StoreError;
use crate::geo;
use crate::models::config::DedupConfig;
use crate::models::report::Report;
use crate::store::ReportStore;

/// Longest duplicate window accepted from configuration, in days.
pub const MAX_WINDOW_DAYS: i64 = 36_500;

/// Candidate query for one duplicate check: same category, created at or after `since`.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateWindow {
    pub category: String,
    pub since: DateTime<Utc>,
}

/// Time/distance windowed duplicate detector.
#[derive(Debug, Clone)]
pub struct DuplicateDetector {
    window: Duration,
    radius_meters: f64,
}

impl DuplicateDetector {
    pub fn new(window: Duration, radius_meters: f64) -> Self {
        Self {
            window,
            radius_meters,
        }
    }

    /// Build from configuration; the window is clamped to `0..=MAX_WINDOW_DAYS` days.
    pub fn from_config(config: &DedupConfig) -> Self {
        let days = config.window_days.clamp(0, MAX_WINDOW_DAYS);
        let window = Duration::try_days(days).unwrap_or_else(Duration::zero);
        Self::new(window, config.radius_meters)
    }

    pub fn radius_meters(&self) -> f64 {
        self.radius_meters
    }

    /// Candidate query for a submission of `category` at `now`.
    ///
    /// A window reaching past the earliest representable instant covers all history.
    pub fn window_for(&self, category: &str, now: DateTime<Utc>) -> DuplicateWindow {
        DuplicateWindow {
            category: category.to_string(),
            since: now
                .checked_sub_signed(self.window)
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
        }
    }

    /// First candidate within the radius, in candidate order.
    pub fn first_within<'a>(&self, candidates: &'a [Report], lat: f64, lon: f64) -> Option<&'a Report> {
        candidates.iter().find(|report| {
            let d = geo::distance(lat, lon, report.latitude, report.longitude);
            debug!(id = %report.id, distance_m = d, "duplicate candidate");
            d <= self.radius_meters
        })
    }

    /// Look up an existing report that `category` at (`lat`, `lon`) duplicates.
    pub async fn find_duplicate<S: ReportStore + ?Sized>(
        &self,
        store: &S,
        category: &str,
        lat: f64,
        lon: f64,
        now: DateTime<Utc>,
    ) -> Result<Option<Report>, StoreError> {
        let window = self.window_for(category, now);
        let candidates = store
            .recent_by_category(&window.category, window.since)
            .await?;

        debug!(
            %category,
            candidates = candidates.len(),
            since = %window.since,
            "checking for duplicates"
        );

        Ok(self.first_within(&candidates, lat, lon).cloned())
    }
}

impl Default for DuplicateDetector {
    fn default() -> Self {
        Self::from_config(&DedupConfig::default())
    }
}
