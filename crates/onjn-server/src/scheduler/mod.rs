//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and, when
//! `ONJN_SYNC_CRON` is set, registers the recurring registry sync.

use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use onjn_sync::SyncError;

use crate::api::ServerSync;

const SCHEDULER_TRIGGER: &str = "scheduler";

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process; dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// the cron expression is invalid, or the scheduler fails to start.
pub async fn build_scheduler(
    sync: ServerSync,
    cron: Option<&str>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    match cron {
        Some(cron) => register_sync_job(&scheduler, sync, cron).await?,
        None => tracing::info!("scheduler: ONJN_SYNC_CRON not set; nightly sync disabled"),
    }

    scheduler.start().await?;
    Ok(scheduler)
}

/// Register the recurring registry sync.
///
/// Goes through the same single-flight gate as the API: a tick that lands
/// while a job is running is skipped and logged.
async fn register_sync_job(
    scheduler: &JobScheduler,
    sync: ServerSync,
    cron: &str,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(cron, move |_uuid, _lock| {
        let sync = sync.clone();
        Box::pin(async move {
            trigger_scheduled_sync(&sync);
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron = %cron, "scheduler: registered registry sync job");
    Ok(())
}

fn trigger_scheduled_sync(sync: &ServerSync) {
    match sync.start(None, SCHEDULER_TRIGGER) {
        Ok(_handle) => tracing::info!("scheduler: registry sync started"),
        Err(SyncError::AlreadyRunning { running }) => {
            tracing::info!(running = %running, "scheduler: sync already running; skipping tick");
        }
        Err(e) => tracing::warn!(error = %e, "scheduler: registry sync not started"),
    }
}
