//! End-to-end report submission.
//!
//! classify → duplicate check → (enrich + route → insert)
//!
//! The detector and the geocoder are the slow steps. Neither runs while a
//! store lock is held: the store is only touched for the duplicate query and
//! the final insert. Two concurrent submissions of the same new issue can both
//! pass the duplicate check and both be inserted; no cross-request locking is
//! done.
//!
//! Model inference is synchronous. On a multi-threaded tokio runtime it runs
//! under `block_in_place` so the worker's other tasks move to another thread.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::classify::{Classification, ClassifierAdapter, Detector, DetectorState};
use crate::dedup::DuplicateDetector;
use crate::enrich::{Geocoder, LocationEnricher};
use crate::error::Result;
use crate::models::config::CivicConfig;
use crate::models::report::{NewReport, Report};
use crate::routing::DepartmentRouter;
use crate::store::ReportStore;

/// Run blocking work, handing the worker's queued tasks off first when on a
/// multi-threaded runtime. Elsewhere the work runs inline.
fn run_blocking<T>(work: impl FnOnce() -> T) -> T {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(work)
        }
        _ => work(),
    }
}

/// Location block returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSummary {
    pub city: Option<String>,
    pub state: Option<String>,
    pub lat: f64,
    pub lon: f64,
}

impl LocationSummary {
    fn of(report: &Report) -> Self {
        Self {
            city: report.city.clone(),
            state: report.state.clone(),
            lat: report.latitude,
            lon: report.longitude,
        }
    }
}

/// What happened to a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    /// No routable issue in the image; nothing was stored.
    Rejected,
    /// An existing report already covers this issue.
    Duplicate {
        original_id: String,
        issue: String,
        assigned_to: String,
        location: LocationSummary,
    },
    /// A new report was created.
    Success {
        report_id: String,
        issue: String,
        assigned_to: String,
        location: LocationSummary,
    },
}

impl SubmissionOutcome {
    /// Id of the new or matched report.
    pub fn report_id(&self) -> Option<&str> {
        match self {
            SubmissionOutcome::Rejected => None,
            SubmissionOutcome::Duplicate { original_id, .. } => Some(original_id),
            SubmissionOutcome::Success { report_id, .. } => Some(report_id),
        }
    }

    /// Lowercase tag, matching the serialised `status` field.
    pub fn status(&self) -> &'static str {
        match self {
            SubmissionOutcome::Rejected => "rejected",
            SubmissionOutcome::Duplicate { .. } => "duplicate",
            SubmissionOutcome::Success { .. } => "success",
        }
    }
}

/// The report ingestion pipeline.
pub struct ReportPipeline<D, S, G> {
    classifier: ClassifierAdapter<D>,
    dedup: DuplicateDetector,
    enricher: LocationEnricher<G>,
    router: DepartmentRouter,
    store: S,
}

impl<D, S, G> ReportPipeline<D, S, G>
where
    D: Detector,
    S: ReportStore,
    G: Geocoder,
{
    /// Create a pipeline with the default duplicate window and routing table.
    pub fn new(classifier: ClassifierAdapter<D>, enricher: LocationEnricher<G>, store: S) -> Self {
        Self {
            classifier,
            dedup: DuplicateDetector::default(),
            enricher,
            router: DepartmentRouter::default(),
            store,
        }
    }

    /// Assemble a pipeline from configuration.
    pub fn from_config(
        config: &CivicConfig,
        detector: DetectorState<D>,
        geocoder: G,
        store: S,
    ) -> Self {
        let classifier = ClassifierAdapter::new(detector)
            .with_allow_list(config.detection.allowed_categories.clone())
            .with_confidence_threshold(config.detection.confidence_threshold);
        let enricher = LocationEnricher::new(geocoder)
            .with_timeout(StdDuration::from_millis(config.geocoding.timeout_ms));

        Self::new(classifier, enricher, store)
            .with_dedup(DuplicateDetector::from_config(&config.dedup))
            .with_router(DepartmentRouter::from_config(&config.routing))
    }

    /// Replace the duplicate detector.
    pub fn with_dedup(mut self, dedup: DuplicateDetector) -> Self {
        self.dedup = dedup;
        self
    }

    /// Replace the routing table.
    pub fn with_router(mut self, router: DepartmentRouter) -> Self {
        self.router = router;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn is_ready(&self) -> bool {
        self.classifier.is_ready()
    }

    /// Submit an image taken at (`lat`, `lon`) now.
    pub async fn submit(&self, image: &[u8], lat: f64, lon: f64) -> Result<SubmissionOutcome> {
        self.submit_at(image, lat, lon, Utc::now()).await
    }

    /// Submit an image taken at (`lat`, `lon`), checking duplicates as of `now`.
    #[instrument(skip(self, image), fields(bytes = image.len()))]
    pub async fn submit_at(
        &self,
        image: &[u8],
        lat: f64,
        lon: f64,
        now: DateTime<Utc>,
    ) -> Result<SubmissionOutcome> {
        let category = match run_blocking(|| self.classifier.classify(image))? {
            Classification::Issue { category, .. } => category,
            Classification::NoIssue => {
                info!("submission rejected");
                return Ok(SubmissionOutcome::Rejected);
            }
        };

        if let Some(existing) = self
            .dedup
            .find_duplicate(&self.store, &category, lat, lon, now)
            .await?
        {
            info!(original_id = %existing.id, %category, "duplicate of existing report");
            return Ok(SubmissionOutcome::Duplicate {
                original_id: existing.id.clone(),
                issue: category,
                assigned_to: existing.department.clone(),
                location: LocationSummary::of(&existing),
            });
        }

        let (address, city, state) = self.enricher.enrich(lat, lon).await.into_fields();
        let department = self.router.assign(&category).to_string();

        let report = self
            .store
            .insert(NewReport {
                category: category.clone(),
                latitude: lat,
                longitude: lon,
                department,
                image_url: None,
                address,
                city,
                state,
            })
            .await?;

        info!(report_id = %report.id, %category, department = %report.department, "report created");

        Ok(SubmissionOutcome::Success {
            report_id: report.id.clone(),
            issue: category,
            assigned_to: report.department.clone(),
            location: LocationSummary::of(&report),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use tokio::sync::Barrier;

    use crate::classify::tests::FixedDetector;
    use crate::classify::CandidateDetection;
    use crate::enrich::tests::{place, ScriptedGeocoder};
    use crate::enrich::{GeocodedPlace, NoopGeocoder};
    use crate::error::{CivicError, ClassificationError, GeocodeError, StoreError};
    use crate::store::MemoryStore;

    const LAT: f64 = 19.0760;
    const LON: f64 = 72.8777;

    fn pipeline<G: Geocoder>(
        detections: &[(&str, f32)],
        geocoder: G,
        store: MemoryStore,
    ) -> ReportPipeline<FixedDetector, MemoryStore, G> {
        ReportPipeline::new(
            ClassifierAdapter::new(DetectorState::Ready(FixedDetector::returning(detections))),
            LocationEnricher::new(geocoder),
            store,
        )
    }

    fn mumbai() -> ScriptedGeocoder {
        ScriptedGeocoder::Found(place(
            "Marine Drive, Mumbai, Maharashtra, India",
            &[("city", "Mumbai"), ("state", "Maharashtra")],
        ))
    }

    /// Counts lookups, always answering with no result.
    #[derive(Default)]
    struct CountingGeocoder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Geocoder for CountingGeocoder {
        async fn reverse(
            &self,
            _lat: f64,
            _lon: f64,
        ) -> std::result::Result<Option<GeocodedPlace>, GeocodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_fresh_location_creates_report() {
        let p = pipeline(&[("overflowing", 0.8)], mumbai(), MemoryStore::new());

        let outcome = p.submit(b"image", LAT, LON).await.unwrap();

        let report_id = match &outcome {
            SubmissionOutcome::Success {
                report_id,
                issue,
                assigned_to,
                location,
            } => {
                assert_eq!(issue, "overflowing");
                assert_eq!(assigned_to, "Sanitation Dept");
                assert_eq!(location.city.as_deref(), Some("Mumbai"));
                assert_eq!(location.lat, LAT);
                report_id.clone()
            }
            other => panic!("expected success, got {:?}", other),
        };

        let stored = p.store().get(&report_id).await.unwrap().unwrap();
        assert_eq!(stored.category, "overflowing");
        assert_eq!(stored.latitude, LAT);
        assert_eq!(stored.longitude, LON);
        assert_eq!(stored.department, "Sanitation Dept");
        assert_eq!(stored.state.as_deref(), Some("Maharashtra"));
        assert_eq!(stored.status, "Submitted");
    }

    #[tokio::test]
    async fn test_duplicate_references_original() {
        let now = Utc::now();
        let original = Report::from_new(
            NewReport {
                category: "pothole".to_string(),
                latitude: LAT,
                longitude: LON,
                department: "Roads Dept".to_string(),
                image_url: None,
                address: Some("Marine Drive".to_string()),
                city: Some("Mumbai".to_string()),
                state: Some("Maharashtra".to_string()),
            },
            "orig0001".to_string(),
            now - Duration::days(2),
        );
        let geocoder = CountingGeocoder::default();
        let p = pipeline(
            &[("pothole", 0.7)],
            geocoder,
            MemoryStore::with_reports(vec![original]),
        );

        // About 55 m north of the original.
        let outcome = p.submit_at(b"image", LAT + 0.0005, LON, now).await.unwrap();

        assert_eq!(
            outcome,
            SubmissionOutcome::Duplicate {
                original_id: "orig0001".to_string(),
                issue: "pothole".to_string(),
                assigned_to: "Roads Dept".to_string(),
                location: LocationSummary {
                    city: Some("Mumbai".to_string()),
                    state: Some("Maharashtra".to_string()),
                    lat: LAT,
                    lon: LON,
                },
            }
        );
        assert_eq!(p.store().len().await, 1);
        assert_eq!(p.enricher.geocoder().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_issue_is_rejected_without_persistence() {
        let geocoder = CountingGeocoder::default();
        let p = pipeline(&[("dog", 0.95)], geocoder, MemoryStore::new());

        let outcome = p.submit(b"image", LAT, LON).await.unwrap();

        assert_eq!(outcome, SubmissionOutcome::Rejected);
        assert!(p.store().is_empty().await);
        assert_eq!(p.enricher.geocoder().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unavailable_detector_fails_submission() {
        let p: ReportPipeline<FixedDetector, _, _> = ReportPipeline::new(
            ClassifierAdapter::new(DetectorState::unavailable("no model")),
            LocationEnricher::new(NoopGeocoder),
            MemoryStore::new(),
        );

        let err = p.submit(b"image", LAT, LON).await.unwrap_err();
        assert!(matches!(
            err,
            CivicError::ClassificationUnavailable(ClassificationError::DetectorUnavailable(_))
        ));
        assert!(p.store().is_empty().await);
    }

    #[tokio::test]
    async fn test_unreadable_image_fails_submission() {
        let p = ReportPipeline::new(
            ClassifierAdapter::new(DetectorState::Ready(FixedDetector::unreadable())),
            LocationEnricher::new(NoopGeocoder),
            MemoryStore::new(),
        );

        let err = p.submit(b"\x00\x01", LAT, LON).await.unwrap_err();
        assert!(matches!(err, CivicError::ClassificationUnavailable(_)));
    }

    #[tokio::test]
    async fn test_enrichment_failure_still_creates_report() {
        let p = pipeline(&[("pothole", 0.9)], ScriptedGeocoder::Fails, MemoryStore::new());

        let outcome = p.submit(b"image", LAT, LON).await.unwrap();
        let id = outcome.report_id().unwrap().to_string();
        assert_eq!(outcome.status(), "success");

        let stored = p.store().get(&id).await.unwrap().unwrap();
        assert_eq!(stored.address.as_deref(), Some("Unknown Location"));
        assert_eq!(stored.city.as_deref(), Some("Unknown"));
        assert_eq!(stored.state.as_deref(), Some("Unknown"));
        assert_eq!(stored.department, "Roads Dept");
    }

    #[tokio::test]
    async fn test_same_spot_after_window_creates_new_report() {
        let p = pipeline(&[("pothole", 0.9)], NoopGeocoder, MemoryStore::new());

        let first = p.submit(b"image", LAT, LON).await.unwrap();
        let later = Utc::now() + Duration::days(8);
        let second = p.submit_at(b"image", LAT, LON, later).await.unwrap();

        assert_eq!(first.status(), "success");
        assert_eq!(second.status(), "success");
        assert_ne!(first.report_id(), second.report_id());
        assert_eq!(p.store().len().await, 2);
    }

    #[tokio::test]
    async fn test_sequential_resubmission_is_duplicate() {
        let p = pipeline(&[("garbage_pile", 0.6)], NoopGeocoder, MemoryStore::new());

        let first = p.submit(b"image", LAT, LON).await.unwrap();
        let second = p.submit(b"image", LAT, LON).await.unwrap();

        assert_eq!(second.status(), "duplicate");
        assert_eq!(second.report_id(), first.report_id());
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = SubmissionOutcome::Success {
            report_id: "ab12cd34".to_string(),
            issue: "full".to_string(),
            assigned_to: "Sanitation Dept".to_string(),
            location: LocationSummary {
                city: None,
                state: None,
                lat: 1.5,
                lon: 2.5,
            },
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status": "success",
                "report_id": "ab12cd34",
                "issue": "full",
                "assigned_to": "Sanitation Dept",
                "location": {"city": null, "state": null, "lat": 1.5, "lon": 2.5}
            })
        );

        assert_eq!(
            serde_json::to_value(SubmissionOutcome::Rejected).unwrap(),
            serde_json::json!({"status": "rejected"})
        );
    }

    /// Store whose backend is down.
    struct BrokenStore;

    #[async_trait]
    impl ReportStore for BrokenStore {
        async fn recent_by_category(
            &self,
            _category: &str,
            _since: DateTime<Utc>,
        ) -> std::result::Result<Vec<Report>, StoreError> {
            Err(StoreError::Backend("database offline".to_string()))
        }

        async fn insert(&self, _report: NewReport) -> std::result::Result<Report, StoreError> {
            Err(StoreError::Backend("database offline".to_string()))
        }

        async fn all(&self) -> std::result::Result<Vec<Report>, StoreError> {
            Err(StoreError::Backend("database offline".to_string()))
        }

        async fn get(&self, _id: &str) -> std::result::Result<Option<Report>, StoreError> {
            Err(StoreError::Backend("database offline".to_string()))
        }

        async fn update_status(
            &self,
            id: &str,
            _status: &str,
        ) -> std::result::Result<Report, StoreError> {
            Err(StoreError::NotFound(id.to_string()))
        }
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let p = ReportPipeline::new(
            ClassifierAdapter::new(DetectorState::Ready(FixedDetector::returning(&[(
                "pothole", 0.9,
            )]))),
            LocationEnricher::new(NoopGeocoder),
            BrokenStore,
        );

        let err = p.submit(b"image", LAT, LON).await.unwrap_err();
        assert!(matches!(err, CivicError::Store(StoreError::Backend(_))));
    }

    /// Store that holds every duplicate query until `parties` queries are in flight.
    struct LockstepStore {
        inner: MemoryStore,
        barrier: Barrier,
    }

    #[async_trait]
    impl ReportStore for LockstepStore {
        async fn recent_by_category(
            &self,
            category: &str,
            since: DateTime<Utc>,
        ) -> std::result::Result<Vec<Report>, StoreError> {
            let rows = self.inner.recent_by_category(category, since).await?;
            self.barrier.wait().await;
            Ok(rows)
        }

        async fn insert(&self, report: NewReport) -> std::result::Result<Report, StoreError> {
            self.inner.insert(report).await
        }

        async fn all(&self) -> std::result::Result<Vec<Report>, StoreError> {
            self.inner.all().await
        }

        async fn get(&self, id: &str) -> std::result::Result<Option<Report>, StoreError> {
            self.inner.get(id).await
        }

        async fn update_status(
            &self,
            id: &str,
            status: &str,
        ) -> std::result::Result<Report, StoreError> {
            self.inner.update_status(id, status).await
        }
    }

    #[tokio::test]
    async fn test_concurrent_submissions_can_both_create() {
        let store = Arc::new(LockstepStore {
            inner: MemoryStore::new(),
            barrier: Barrier::new(2),
        });
        let p = ReportPipeline::new(
            ClassifierAdapter::new(DetectorState::Ready(FixedDetector::returning(&[(
                "pothole", 0.9,
            )]))),
            LocationEnricher::new(NoopGeocoder),
            Arc::clone(&store),
        );

        let (a, b) = tokio::join!(
            p.submit(b"image", LAT, LON),
            p.submit(b"image", LAT, LON)
        );

        // Both saw an empty candidate set, so both were inserted.
        assert_eq!(a.unwrap().status(), "success");
        assert_eq!(b.unwrap().status(), "success");
        assert_eq!(store.inner.len().await, 2);
    }

    /// Blocks inside `predict` until another task on the runtime releases it.
    struct GatedDetector {
        started: tokio::sync::mpsc::UnboundedSender<()>,
        release: std::sync::Mutex<std::sync::mpsc::Receiver<()>>,
    }

    impl Detector for GatedDetector {
        fn predict(
            &self,
            _image: &[u8],
            _confidence_threshold: f32,
        ) -> std::result::Result<Vec<CandidateDetection>, ClassificationError> {
            let _ = self.started.send(());
            let release = self.release.lock().unwrap();
            match release.recv_timeout(StdDuration::from_secs(5)) {
                Ok(()) => Ok(vec![CandidateDetection::new("pothole", 0.9)]),
                Err(_) => Err(ClassificationError::Inference(
                    "worker stayed blocked".to_string(),
                )),
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_inference_does_not_starve_other_tasks() {
        let (started_tx, mut started_rx) = tokio::sync::mpsc::unbounded_channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel();
        let p = Arc::new(ReportPipeline::new(
            ClassifierAdapter::new(DetectorState::Ready(GatedDetector {
                started: started_tx,
                release: std::sync::Mutex::new(release_rx),
            })),
            LocationEnricher::new(NoopGeocoder),
            MemoryStore::new(),
        ));

        // Both tasks share the single worker; the releaser only runs if the
        // submission gives that worker up while the detector blocks.
        let submission = tokio::spawn({
            let p = Arc::clone(&p);
            async move { p.submit(b"image", LAT, LON).await }
        });
        let releaser = tokio::spawn(async move {
            started_rx.recv().await;
            release_tx.send(()).unwrap();
        });

        let outcome = submission.await.unwrap().unwrap();
        releaser.await.unwrap();
        assert_eq!(outcome.status(), "success");
    }

    #[tokio::test]
    async fn test_current_thread_runtime_runs_inference_inline() {
        let p = pipeline(&[("pothole", 0.9)], NoopGeocoder, MemoryStore::new());
        let outcome = p.submit(b"image", LAT, LON).await.unwrap();
        assert_eq!(outcome.status(), "success");
    }

    #[test]
    fn test_from_config_uses_config_tables() {
        let mut config = CivicConfig::default();
        config
            .routing
            .departments
            .insert("Parks Dept".to_string(), vec!["fallen_tree".to_string()]);
        config.detection.allowed_categories.push("fallen_tree".to_string());

        let p = ReportPipeline::from_config(
            &config,
            DetectorState::Ready(FixedDetector::returning(&[("fallen_tree", 0.9)])),
            NoopGeocoder,
            MemoryStore::new(),
        );

        assert!(p.is_ready());
        assert_eq!(p.router.assign("fallen_tree"), "Parks Dept");
        assert_eq!(p.dedup.radius_meters(), 100.0);
    }
}
