//! Public "reports near me" read path.

use tracing::debug;

use crate::error::StoreError;
use crate::geo::GeoPoint;
use crate::models::report::Report;
use crate::store::ReportStore;

/// Radius used by the public nearby query when the caller gives none.
pub const DEFAULT_NEARBY_RADIUS_METERS: f64 = 1000.0;

/// Every report within `radius_meters` (inclusive) of (`lat`, `lon`), newest first.
pub async fn nearby_reports<S: ReportStore + ?Sized>(
    store: &S,
    lat: f64,
    lon: f64,
    radius_meters: f64,
) -> Result<Vec<Report>, StoreError> {
    let origin = GeoPoint::new(lat, lon);
    let reports: Vec<Report> = store
        .all()
        .await?
        .into_iter()
        .filter(|r| origin.within(&r.point(), radius_meters))
        .collect();

    debug!(lat, lon, radius_meters, found = reports.len(), "nearby reports");

    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::report::NewReport;
    use crate::store::MemoryStore;
    use chrono::{Duration, Utc};
    use pretty_assertions::assert_eq;

    fn report(id: &str, lat: f64, lon: f64, hours_ago: i64) -> Report {
        Report::from_new(
            NewReport {
                category: "pothole".to_string(),
                latitude: lat,
                longitude: lon,
                department: "Roads Dept".to_string(),
                image_url: None,
                address: None,
                city: None,
                state: None,
            },
            id.to_string(),
            Utc::now() - Duration::hours(hours_ago),
        )
    }

    #[tokio::test]
    async fn test_filters_by_radius_newest_first() {
        // 0.005 deg of latitude is about 556 m, 0.02 deg about 2.2 km.
        let store = MemoryStore::with_reports(vec![
            report("older-near", 0.005, 0.0, 48),
            report("far", 0.02, 0.0, 1),
            report("newer-near", 0.0, 0.0, 2),
        ]);

        let ids: Vec<String> = nearby_reports(&store, 0.0, 0.0, DEFAULT_NEARBY_RADIUS_METERS)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["newer-near", "older-near"]);
    }

    #[tokio::test]
    async fn test_zero_radius_matches_exact_point() {
        let store = MemoryStore::with_reports(vec![report("here", 10.0, 20.0, 1)]);
        let found = nearby_reports(&store, 10.0, 20.0, 0.0).await.unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_store() {
        let store = MemoryStore::new();
        assert!(nearby_reports(&store, 0.0, 0.0, 5000.0).await.unwrap().is_empty());
    }
}
