//! The registry sync job.
//!
//! [`RegistrySyncJob::start`] and [`RegistrySyncJob::import_from_snapshot`]
//! claim the [`JobStatusStore`] and hand the work to a spawned task; the
//! caller gets control back as soon as the claim succeeds. Progress is
//! published to the store after every page (or snapshot chunk).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use onjn_core::{AppConfig, RecordStore, UpsertOutcome};
use onjn_registry::{decode_row, load_snapshot, RegistryError, SnapshotRow};
use tokio::task::JoinHandle;

use crate::error::SyncError;
use crate::source::PageSource;
use crate::status::{JobKind, JobStatusStore, SyncJob, SyncStatus};

/// Knobs of a sync run.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub page_size: u32,
    pub default_max_pages: u32,
    /// Consecutive failed pages that fail the job. At least 2.
    pub max_consecutive_failures: u32,
    pub inter_page_delay: Duration,
    pub snapshot_path: PathBuf,
    pub snapshot_chunk_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            default_max_pages: 1000,
            max_consecutive_failures: 3,
            inter_page_delay: Duration::from_millis(250),
            snapshot_path: PathBuf::from("./data/onjn_snapshot.json"),
            snapshot_chunk_size: 500,
        }
    }
}

impl SyncConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            page_size: config.registry_page_size.max(1),
            default_max_pages: config.sync_default_max_pages.max(1),
            max_consecutive_failures: config.sync_max_consecutive_failures.max(2),
            inter_page_delay: Duration::from_millis(config.sync_inter_page_delay_ms),
            snapshot_path: config.sync_snapshot_path.clone(),
            snapshot_chunk_size: config.sync_snapshot_chunk_size.max(1),
        }
    }
}

/// Counters for one page or chunk of rows.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct BatchCounts {
    seen: u64,
    inserted: u64,
    updated: u64,
    errors: u64,
}

/// Single-flight sync job over a page source and a record store.
///
/// Cheap to clone; clones share the source, the store and the status.
pub struct RegistrySyncJob<S, R> {
    source: Arc<S>,
    store: Arc<R>,
    jobs: JobStatusStore,
    config: SyncConfig,
}

impl<S, R> Clone for RegistrySyncJob<S, R> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            store: Arc::clone(&self.store),
            jobs: self.jobs.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S, R> RegistrySyncJob<S, R>
where
    S: PageSource,
    R: RecordStore + 'static,
{
    pub fn new(source: S, store: R, jobs: JobStatusStore, config: SyncConfig) -> Self {
        Self {
            source: Arc::new(source),
            store: Arc::new(store),
            jobs,
            config,
        }
    }

    #[must_use]
    pub fn jobs(&self) -> &JobStatusStore {
        &self.jobs
    }

    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Starts paging through the registry in the background.
    ///
    /// `max_pages` defaults to the configured limit. The returned handle
    /// resolves to the final job state; dropping it does not stop the job.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::AlreadyRunning`] if a job is running. Registry
    /// and store failures never surface here; they land in the job status.
    pub fn start(
        &self,
        max_pages: Option<u32>,
        trigger: &str,
    ) -> Result<JoinHandle<SyncJob>, SyncError> {
        self.jobs.try_begin(JobKind::Registry, trigger, Utc::now())?;
        let max_pages = max_pages.unwrap_or(self.config.default_max_pages).max(1);
        tracing::info!(max_pages, trigger, "registry sync started");

        let this = self.clone();
        Ok(tokio::spawn(async move {
            this.run_registry(max_pages).await;
            this.jobs.get()
        }))
    }

    /// Imports a locally captured snapshot in the background.
    ///
    /// `path` defaults to the configured snapshot file. Same single-flight
    /// rule and status reporting as [`Self::start`]; each chunk of
    /// `snapshot_chunk_size` rows counts as one page.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::AlreadyRunning`] if a job is running. An
    /// unreadable snapshot fails the job instead.
    pub fn import_from_snapshot(
        &self,
        path: Option<PathBuf>,
        trigger: &str,
    ) -> Result<JoinHandle<SyncJob>, SyncError> {
        self.jobs.try_begin(JobKind::Snapshot, trigger, Utc::now())?;
        let path = path.unwrap_or_else(|| self.config.snapshot_path.clone());
        tracing::info!(path = %path.display(), trigger, "snapshot import started");

        let this = self.clone();
        Ok(tokio::spawn(async move {
            if let Err(e) = this.run_snapshot(&path).await {
                tracing::error!(path = %path.display(), error = %e, "snapshot import failed");
                this.jobs
                    .finish(SyncStatus::Failed, e.to_string(), Utc::now());
            }
            this.jobs.get()
        }))
    }

    async fn run_registry(&self, max_pages: u32) {
        let threshold = self.config.max_consecutive_failures.max(2);
        let mut consecutive_failures = 0u32;
        let mut page = 1u32;

        loop {
            if page > max_pages {
                self.finish_completed(format!("stopped after max_pages ({max_pages})"));
                return;
            }
            if page > 1 && !self.config.inter_page_delay.is_zero() {
                tokio::time::sleep(self.config.inter_page_delay).await;
            }
            self.jobs
                .update(|job| job.current_step = format!("fetching page {page}"));

            match self.source.fetch_page(page, self.config.page_size).await {
                Ok(fetched) => {
                    consecutive_failures = 0;
                    let has_more = fetched.has_more;
                    let counts = self
                        .ingest(fetched.records.into_iter().map(Ok::<_, RegistryError>))
                        .await;
                    self.jobs.update(|job| {
                        apply_counts(job, counts);
                        job.current_page = page;
                        if fetched.total_pages.is_some() {
                            job.total_pages = fetched.total_pages;
                        }
                        job.current_step = format!("page {page} processed");
                    });
                    tracing::debug!(
                        page,
                        seen = counts.seen,
                        inserted = counts.inserted,
                        updated = counts.updated,
                        errors = counts.errors,
                        "registry page processed"
                    );
                    if !has_more {
                        self.finish_completed(format!("registry exhausted after page {page}"));
                        return;
                    }
                }
                Err(e) => {
                    consecutive_failures += 1;
                    tracing::warn!(
                        page,
                        consecutive_failures,
                        threshold,
                        error = %e,
                        "registry page failed"
                    );
                    if consecutive_failures >= threshold {
                        self.jobs.update(|job| {
                            job.errors += 1;
                            job.current_page = page;
                        });
                        let cause = format!(
                            "registry failed on {consecutive_failures} consecutive pages; \
                             page {page}: {e}"
                        );
                        tracing::error!(page, error = %e, "registry sync failed");
                        self.jobs.finish(SyncStatus::Failed, cause, Utc::now());
                        return;
                    }
                    self.jobs.update(|job| {
                        job.errors += 1;
                        job.current_page = page;
                        job.current_step = format!("page {page} skipped: {e}");
                    });
                }
            }
            page += 1;
        }
    }

    async fn run_snapshot(&self, path: &std::path::Path) -> Result<(), SyncError> {
        let rows = load_snapshot(path).await.map_err(SyncError::Snapshot)?;
        let chunk_size = self.config.snapshot_chunk_size.max(1);
        let total_pages = u32::try_from(rows.len().div_ceil(chunk_size)).unwrap_or(u32::MAX);
        self.jobs.update(|job| {
            job.total_pages = Some(total_pages);
            job.current_step = format!("loaded {} rows from {}", rows.len(), path.display());
        });

        let mut rows = rows.into_iter();
        let mut chunk_no = 0u32;
        loop {
            let chunk: Vec<SnapshotRow> = rows.by_ref().take(chunk_size).collect();
            if chunk.is_empty() {
                break;
            }
            chunk_no += 1;
            let counts = self.ingest(chunk).await;
            self.jobs.update(|job| {
                apply_counts(job, counts);
                job.current_page = chunk_no;
                job.current_step = format!("chunk {chunk_no}/{total_pages} processed");
            });
        }

        self.finish_completed(format!("snapshot {} imported", path.display()));
        Ok(())
    }

    /// Decodes and upserts every row; bad rows are counted and skipped.
    async fn ingest<I>(&self, rows: I) -> BatchCounts
    where
        I: IntoIterator<Item = Result<serde_json::Value, RegistryError>>,
    {
        let scraped_at = Utc::now();
        let mut counts = BatchCounts::default();
        for row in rows {
            counts.seen += 1;
            let record = match row.and_then(|value| decode_row(value, scraped_at)) {
                Ok(record) => record,
                Err(e) => {
                    counts.errors += 1;
                    tracing::warn!(error = %e, "skipping invalid registry row");
                    continue;
                }
            };
            match self.store.upsert(&record).await {
                Ok(UpsertOutcome::Inserted) => counts.inserted += 1,
                Ok(UpsertOutcome::Updated) => counts.updated += 1,
                Err(e) => {
                    counts.errors += 1;
                    tracing::warn!(serial = %record.serial_number, error = %e, "upsert failed");
                }
            }
        }
        counts
    }

    fn finish_completed(&self, step: String) {
        let job = self.jobs.get();
        tracing::info!(
            kind = ?job.kind,
            pages = job.current_page,
            records_seen = job.records_seen,
            inserted = job.inserted,
            updated = job.updated,
            errors = job.errors,
            "sync completed"
        );
        self.jobs.finish(SyncStatus::Completed, step, Utc::now());
    }
}

fn apply_counts(job: &mut SyncJob, counts: BatchCounts) {
    job.records_seen += counts.seen;
    job.inserted += counts.inserted;
    job.updated += counts.updated;
    job.errors += counts.errors;
}
