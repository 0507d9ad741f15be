//! In-process report store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{ReportStore, ReportTable};
use crate::error::StoreError;
use crate::models::report::{NewReport, Report};

/// Report store held in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    table: RwLock<ReportTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with existing reports, kept in the given order.
    pub fn with_reports(reports: Vec<Report>) -> Self {
        Self {
            table: RwLock::new(ReportTable::from_rows(reports)),
        }
    }

    /// Number of stored reports.
    pub async fn len(&self) -> usize {
        self.table.read().await.rows().len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn recent_by_category(
        &self,
        category: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Report>, StoreError> {
        Ok(self.table.read().await.recent_by_category(category, since))
    }

    async fn insert(&self, report: NewReport) -> Result<Report, StoreError> {
        Ok(self.table.write().await.insert(report, Utc::now()))
    }

    async fn all(&self) -> Result<Vec<Report>, StoreError> {
        Ok(self.table.read().await.newest_first())
    }

    async fn get(&self, id: &str) -> Result<Option<Report>, StoreError> {
        Ok(self.table.read().await.get(id))
    }

    async fn update_status(&self, id: &str, status: &str) -> Result<Report, StoreError> {
        self.table.write().await.update_status(id, status)
    }
}
