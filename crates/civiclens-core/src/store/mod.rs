//! Report persistence.
//!
//! The pipeline only depends on [`ReportStore`]. Candidate filtering for the
//! duplicate check happens inside the store (`recent_by_category`), so a
//! database-backed implementation can push it into its query.

mod json_file;
mod memory;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::models::report::{generate_report_id, NewReport, Report};

/// Queryable store of reports.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Reports of `category` created at or after `since`, in storage order.
    async fn recent_by_category(
        &self,
        category: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Report>, StoreError>;

    /// Persist a new report, assigning its id, timestamp and initial status.
    async fn insert(&self, report: NewReport) -> Result<Report, StoreError>;

    /// Every report, newest first.
    async fn all(&self) -> Result<Vec<Report>, StoreError>;

    /// Report by id.
    async fn get(&self, id: &str) -> Result<Option<Report>, StoreError>;

    /// Replace the workflow status of an existing report.
    async fn update_status(&self, id: &str, status: &str) -> Result<Report, StoreError>;
}

#[async_trait]
impl<S: ReportStore + ?Sized> ReportStore for Arc<S> {
    async fn recent_by_category(
        &self,
        category: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Report>, StoreError> {
        (**self).recent_by_category(category, since).await
    }

    async fn insert(&self, report: NewReport) -> Result<Report, StoreError> {
        (**self).insert(report).await
    }

    async fn all(&self) -> Result<Vec<Report>, StoreError> {
        (**self).all().await
    }

    async fn get(&self, id: &str) -> Result<Option<Report>, StoreError> {
        (**self).get(id).await
    }

    async fn update_status(&self, id: &str, status: &str) -> Result<Report, StoreError> {
        (**self).update_status(id, status).await
    }
}

/// Report rows in insertion order, shared by the in-process stores.
#[derive(Debug, Clone, Default)]
pub(crate) struct ReportTable {
    rows: Vec<Report>,
}

impl ReportTable {
    pub(crate) fn from_rows(rows: Vec<Report>) -> Self {
        Self { rows }
    }

    pub(crate) fn rows(&self) -> &[Report] {
        &self.rows
    }

    pub(crate) fn recent_by_category(&self, category: &str, since: DateTime<Utc>) -> Vec<Report> {
        self.rows
            .iter()
            .filter(|r| r.category == category && r.timestamp >= since)
            .cloned()
            .collect()
    }

    pub(crate) fn insert(&mut self, report: NewReport, now: DateTime<Utc>) -> Report {
        let mut id = generate_report_id();
        while self.rows.iter().any(|r| r.id == id) {
            id = generate_report_id();
        }
        let report = Report::from_new(report, id, now);
        self.rows.push(report.clone());
        report
    }

    pub(crate) fn newest_first(&self) -> Vec<Report> {
        let mut rows = self.rows.clone();
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        rows
    }

    pub(crate) fn get(&self, id: &str) -> Option<Report> {
        self.rows.iter().find(|r| r.id == id).cloned()
    }

    pub(crate) fn update_status(&mut self, id: &str, status: &str) -> Result<Report, StoreError> {
        let report = self
            .rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        report.status = status.to_string();
        Ok(report.clone())
    }
}
