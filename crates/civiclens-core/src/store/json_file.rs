//! Report store persisted as a single JSON file.
//!
//! The file is the only source of truth: every read loads it, and every
//! mutation reloads, changes and rewrites it while holding a lock file next to
//! it. Several handles, in one process or in several, can share one file
//! without dropping each other's reports.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{ReportStore, ReportTable};
use crate::error::StoreError;
use crate::models::report::{NewReport, Report};

/// A lock file older than this is assumed to belong to a crashed writer.
const LOCK_STALE_AFTER: Duration = Duration::from_secs(30);

/// Pause between attempts to take a held lock.
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(20);

/// Report store backed by a JSON array on disk.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    writer: Mutex<()>,
}

impl JsonFileStore {
    /// Open the store at `path`; a missing or empty file is an empty store.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let rows = read_rows(&path).await?;

        debug!("Opened report store {} with {} reports", path.display(), rows.len());

        Ok(Self {
            path,
            writer: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(suffix);
        PathBuf::from(name)
    }

    async fn load(&self) -> Result<ReportTable, StoreError> {
        Ok(ReportTable::from_rows(read_rows(&self.path).await?))
    }

    /// Reload the file, apply `change`, and write the result back.
    ///
    /// Nothing is written when `change` fails.
    async fn mutate<T>(
        &self,
        change: impl FnOnce(&mut ReportTable) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _writer = self.writer.lock().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let _lock = LockFile::acquire(self.sibling(".lock")).await?;

        let mut table = self.load().await?;
        let value = change(&mut table)?;
        self.persist(&table).await?;

        Ok(value)
    }

    async fn persist(&self, table: &ReportTable) -> Result<(), StoreError> {
        let content = serde_json::to_vec_pretty(table.rows())?;
        let tmp = self.sibling(".tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        Ok(())
    }
}

async fn read_rows(path: &Path) -> Result<Vec<Report>, StoreError> {
    match tokio::fs::read(path).await {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Exclusive lock held by creating `<store>.lock`; removed on drop.
struct LockFile {
    path: PathBuf,
}

impl LockFile {
    async fn acquire(path: PathBuf) -> Result<Self, StoreError> {
        loop {
            let created = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;

            match created {
                Ok(_) => return Ok(Self { path }),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if is_stale(&path).await {
                        warn!("Breaking stale store lock {}", path.display());
                        match tokio::fs::remove_file(&path).await {
                            Ok(()) => {}
                            Err(e) if e.kind() == ErrorKind::NotFound => {}
                            Err(e) => return Err(e.into()),
                        }
                    } else {
                        tokio::time::sleep(LOCK_RETRY_INTERVAL).await;
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!("Could not release store lock {}: {}", self.path.display(), e);
        }
    }
}

async fn is_stale(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .ok()
        .and_then(|m| m.modified().ok())
        .and_then(|modified| modified.elapsed().ok())
        .is_some_and(|age| age > LOCK_STALE_AFTER)
}

#[async_trait]
impl ReportStore for JsonFileStore {
    async fn recent_by_category(
        &self,
        category: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Report>, StoreError> {
        Ok(self.load().await?.recent_by_category(category, since))
    }

    async fn insert(&self, report: NewReport) -> Result<Report, StoreError> {
        self.mutate(|table| Ok(table.insert(report, Utc::now()))).await
    }

    async fn all(&self) -> Result<Vec<Report>, StoreError> {
        Ok(self.load().await?.newest_first())
    }

    async fn get(&self, id: &str) -> Result<Option<Report>, StoreError> {
        Ok(self.load().await?.get(id))
    }

    async fn update_status(&self, id: &str, status: &str) -> Result<Report, StoreError> {
        self.mutate(|table| table.update_status(id, status)).await
    }
}
