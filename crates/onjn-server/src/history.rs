//! Persists a `sync_runs` row per job by watching the job status.
//!
//! Best effort: a database error is logged and the job is unaffected. The
//! table is history only; single-flight lives in the status store.
//!
//! The watch channel only keeps the latest state, so a short job can end
//! and the next one start between two wake-ups. A run still open when a
//! newer start time shows up is closed as failed with [`SUPERSEDED`].

use chrono::{DateTime, Utc};
use onjn_db::SyncRunCounters;
use onjn_sync::{JobKind, JobStatusStore, SyncJob, SyncStatus};
use sqlx::PgPool;
use tokio::task::JoinHandle;

const SUPERSEDED: &str = "superseded before completion was observed";

/// What the recorder must do for an observed job state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Nothing,
    Open,
    /// Finish the run; `create_first` when the `running` state was missed.
    Close { create_first: bool },
}

#[derive(Debug, Default)]
struct Recorder {
    /// Start time and row id of the run currently open in the table.
    open: Option<(DateTime<Utc>, i64)>,
    /// Start time of the last run written as finished.
    closed: Option<DateTime<Utc>>,
}

impl Recorder {
    fn plan(&self, job: &SyncJob) -> Step {
        let Some(start) = job.start_time else {
            return Step::Nothing;
        };
        if self.closed == Some(start) {
            return Step::Nothing;
        }
        let is_open = self.open.is_some_and(|(open_start, _)| open_start == start);
        match job.status {
            SyncStatus::Running if is_open => Step::Nothing,
            SyncStatus::Running => Step::Open,
            SyncStatus::Completed | SyncStatus::Failed => Step::Close {
                create_first: !is_open,
            },
            SyncStatus::Idle => Step::Nothing,
        }
    }

    /// The open run, if `job` belongs to a later start.
    fn superseded(&self, job: &SyncJob) -> Option<(DateTime<Utc>, i64)> {
        let start = job.start_time?;
        self.open.filter(|(open_start, _)| *open_start != start)
    }

    async fn observe(&mut self, pool: &PgPool, job: &SyncJob) {
        let Some(start) = job.start_time else {
            return;
        };
        if let Some((stale_start, id)) = self.superseded(job) {
            tracing::warn!(
                sync_run_id = id,
                started_at = %stale_start,
                "history: run ended unobserved; closing it as superseded"
            );
            let result =
                onjn_db::fail_sync_run(pool, id, SyncRunCounters::default(), start, SUPERSEDED)
                    .await;
            if let Err(e) = result {
                tracing::warn!(error = %e, sync_run_id = id, "history: failed to close superseded run");
            }
            self.open = None;
            self.closed = Some(stale_start);
        }
        match self.plan(job) {
            Step::Nothing => {}
            Step::Open => {
                if let Some(id) = open_run(pool, job, start).await {
                    self.open = Some((start, id));
                }
            }
            Step::Close { create_first } => {
                let id = if create_first {
                    open_run(pool, job, start).await
                } else {
                    self.open.map(|(_, id)| id)
                };
                if let Some(id) = id {
                    close_run(pool, id, job).await;
                }
                self.open = None;
                self.closed = Some(start);
            }
        }
    }
}

async fn open_run(pool: &PgPool, job: &SyncJob, start: DateTime<Utc>) -> Option<i64> {
    let kind = job.kind.unwrap_or(JobKind::Registry);
    let trigger = job.trigger.as_deref().unwrap_or("unknown");
    match onjn_db::create_sync_run(pool, kind.as_str(), trigger, start).await {
        Ok(row) => Some(row.id),
        Err(e) => {
            tracing::warn!(error = %e, kind = %kind, "history: failed to record sync run start");
            None
        }
    }
}

async fn close_run(pool: &PgPool, id: i64, job: &SyncJob) {
    let counters = counters(job);
    let completed_at = job.finished_at.unwrap_or_else(Utc::now);
    let result = if job.status == SyncStatus::Failed {
        onjn_db::fail_sync_run(pool, id, counters, completed_at, &job.current_step).await
    } else {
        onjn_db::complete_sync_run(pool, id, counters, completed_at).await
    };
    if let Err(e) = result {
        tracing::warn!(error = %e, sync_run_id = id, "history: failed to record sync run end");
    }
}

fn counters(job: &SyncJob) -> SyncRunCounters {
    let clamp = |n: u64| i64::try_from(n).unwrap_or(i64::MAX);
    SyncRunCounters {
        pages_processed: i64::from(job.current_page),
        records_seen: clamp(job.records_seen),
        inserted: clamp(job.inserted),
        updated: clamp(job.updated),
        errors: clamp(job.errors),
    }
}

/// Spawns the recorder; it runs until the status store is dropped.
pub fn spawn_history_recorder(pool: PgPool, jobs: &JobStatusStore) -> JoinHandle<()> {
    let mut rx = jobs.subscribe();
    tokio::spawn(async move {
        let mut recorder = Recorder::default();
        loop {
            let job = rx.borrow_and_update().clone();
            recorder.observe(&pool, &job).await;
            if rx.changed().await.is_err() {
                break;
            }
        }
    })
}
