//! State of the one active (or most recent) sync job.
//!
//! [`JobStatusStore`] wraps a `tokio::sync::watch` channel. Readers take
//! snapshots with [`JobStatusStore::get`] or wait for changes through
//! [`JobStatusStore::subscribe`]; only the runner in this crate mutates.
//! The `running` check and the transition into `running` happen inside a
//! single `send_if_modified` call, which holds the channel's write lock, so
//! two concurrent triggers can never both start a job.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Idle,
    Running,
    Completed,
    Failed,
}

impl SyncStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, SyncStatus::Completed | SyncStatus::Failed)
    }
}

/// Where a job reads its records from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Registry,
    Snapshot,
}

impl JobKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Registry => "registry",
            JobKind::Snapshot => "snapshot",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress and counters of a sync job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncJob {
    pub status: SyncStatus,
    pub kind: Option<JobKind>,
    /// Who asked for the run: `api`, `scheduler`, `cli`.
    pub trigger: Option<String>,
    pub current_page: u32,
    pub total_pages: Option<u32>,
    pub records_seen: u64,
    pub inserted: u64,
    pub updated: u64,
    pub errors: u64,
    pub start_time: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub current_step: String,
}

impl Default for SyncJob {
    fn default() -> Self {
        Self {
            status: SyncStatus::Idle,
            kind: None,
            trigger: None,
            current_page: 0,
            total_pages: None,
            records_seen: 0,
            inserted: 0,
            updated: 0,
            errors: 0,
            start_time: None,
            finished_at: None,
            current_step: "idle".to_string(),
        }
    }
}

impl SyncJob {
    fn started(kind: JobKind, trigger: &str, now: DateTime<Utc>) -> Self {
        Self {
            status: SyncStatus::Running,
            kind: Some(kind),
            trigger: Some(trigger.to_string()),
            start_time: Some(now),
            current_step: "starting".to_string(),
            ..Self::default()
        }
    }
}

/// Derived, client-facing summary of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    Idle,
    Running,
    Succeeded,
    SucceededWithErrors,
    Failed,
    /// Still `running` past the watchdog deadline.
    Stale,
}

/// What pollers see: the job snapshot plus the watchdog verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStatusView {
    #[serde(flatten)]
    pub job: SyncJob,
    pub watchdog_expired: bool,
    pub outcome: SyncOutcome,
}

/// Cheaply clonable handle on the job state.
#[derive(Debug, Clone)]
pub struct JobStatusStore {
    tx: Arc<watch::Sender<SyncJob>>,
}

impl Default for JobStatusStore {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStatusStore {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SyncJob::default());
        Self { tx: Arc::new(tx) }
    }

    /// Snapshot of the current job.
    #[must_use]
    pub fn get(&self) -> SyncJob {
        self.tx.borrow().clone()
    }

    /// Receiver that wakes on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SyncJob> {
        self.tx.subscribe()
    }

    /// Snapshot plus the watchdog verdict at `now`.
    ///
    /// A job still `running` more than `stale_after` after it started is
    /// reported as `completed` with `watchdog_expired = true` and outcome
    /// [`SyncOutcome::Stale`]. The stored state is left untouched: if the
    /// runner is merely slow, its next update still lands, and a new job
    /// cannot start until the stuck one really finishes.
    #[must_use]
    pub fn observe(&self, now: DateTime<Utc>, stale_after: Duration) -> SyncStatusView {
        let mut job = self.get();
        let watchdog_expired = job.status == SyncStatus::Running
            && job
                .start_time
                .and_then(|start| (now - start).to_std().ok())
                .is_some_and(|elapsed| elapsed > stale_after);
        if watchdog_expired {
            job.status = SyncStatus::Completed;
        }
        let outcome = match job.status {
            SyncStatus::Idle => SyncOutcome::Idle,
            SyncStatus::Running => SyncOutcome::Running,
            SyncStatus::Completed if watchdog_expired => SyncOutcome::Stale,
            SyncStatus::Completed if job.errors > 0 => SyncOutcome::SucceededWithErrors,
            SyncStatus::Completed => SyncOutcome::Succeeded,
            SyncStatus::Failed => SyncOutcome::Failed,
        };
        SyncStatusView {
            job,
            watchdog_expired,
            outcome,
        }
    }

    /// Atomically moves a non-running store into a fresh `running` job.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::AlreadyRunning`] if a job is running; the
    /// state is not modified.
    pub(crate) fn try_begin(
        &self,
        kind: JobKind,
        trigger: &str,
        now: DateTime<Utc>,
    ) -> Result<(), SyncError> {
        let mut running_kind = None;
        let began = self.tx.send_if_modified(|job| {
            if job.status == SyncStatus::Running {
                running_kind = job.kind;
                return false;
            }
            *job = SyncJob::started(kind, trigger, now);
            true
        });
        if began {
            Ok(())
        } else {
            Err(SyncError::AlreadyRunning {
                running: running_kind.unwrap_or(kind),
            })
        }
    }

    pub(crate) fn update(&self, apply: impl FnOnce(&mut SyncJob)) {
        self.tx.send_modify(apply);
    }

    pub(crate) fn finish(&self, status: SyncStatus, step: String, now: DateTime<Utc>) {
        self.tx.send_modify(|job| {
            job.status = status;
            job.current_step = step;
            job.finished_at = Some(now);
        });
    }
}

#[cfg(test)]
#[path = "status_test.rs"]
mod tests;
