//! Sync command handlers.
//!
//! The CLI runs the job in-process: it claims its own status store, prints
//! page progress to stderr while the job runs, and records the outcome in
//! `sync_runs` like the server does.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use onjn_core::{AppConfig, Dimension, RecordStore, SlotFilter};
use onjn_db::{PgRecordStore, SyncRunCounters};
use onjn_registry::RegistryClient;
use onjn_sync::{
    JobStatusStore, MemoryRecordStore, PageSource, RegistrySyncJob, SyncConfig, SyncJob,
    SyncStatus,
};
use tokio::task::JoinHandle;

const CLI_TRIGGER: &str = "cli";

fn build_registry_client(config: &AppConfig) -> anyhow::Result<RegistryClient> {
    RegistryClient::new(
        &config.registry_base_url,
        config.registry_request_timeout_secs,
        &config.registry_user_agent,
        config.registry_max_retries,
        config.registry_retry_backoff_base_ms,
    )
    .context("failed to build registry client")
}

fn build_job<R>(config: &AppConfig, store: R) -> anyhow::Result<RegistrySyncJob<RegistryClient, R>>
where
    R: RecordStore + 'static,
{
    Ok(RegistrySyncJob::new(
        build_registry_client(config)?,
        store,
        JobStatusStore::new(),
        SyncConfig::from_app_config(config),
    ))
}

/// Page through the live registry into Postgres.
///
/// # Errors
///
/// Returns an error if the registry client cannot be built, the run row
/// cannot be created, or the job ends `failed`.
pub(crate) async fn run_sync_registry(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    max_pages: Option<u32>,
) -> anyhow::Result<()> {
    let sync = build_job(config, PgRecordStore::new(pool.clone()))?;
    let handle = sync.start(max_pages, CLI_TRIGGER)?;
    let finished = drive(pool, &sync, handle).await?;
    summarize(&finished)
}

/// Import a snapshot file into Postgres.
///
/// # Errors
///
/// Returns an error if the run row cannot be created or the import ends
/// `failed` (including an unreadable snapshot).
pub(crate) async fn run_sync_snapshot(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    path: Option<PathBuf>,
) -> anyhow::Result<()> {
    let sync = build_job(config, PgRecordStore::new(pool.clone()))?;
    let handle = sync.import_from_snapshot(path, CLI_TRIGGER)?;
    let finished = drive(pool, &sync, handle).await?;
    summarize(&finished)
}

/// Import a snapshot into memory and print the county view.
///
/// # Errors
///
/// Returns an error if the import ends `failed`.
pub(crate) async fn run_snapshot_dry_run(
    config: &AppConfig,
    path: Option<PathBuf>,
) -> anyhow::Result<()> {
    let store = MemoryRecordStore::new();
    let sync = build_job(config, store.clone())?;
    let finished = sync.import_from_snapshot(path, CLI_TRIGGER)?.await?;
    summarize(&finished)?;

    let records = store.query_all(&SlotFilter::default()).await?;
    let report = onjn_core::report(&records, Dimension::County, Some(10));
    println!("dry-run: nothing written; county view of the snapshot:");
    crate::report::print_report(&report);
    Ok(())
}

/// Print the status a running server reports.
///
/// # Errors
///
/// Returns an error if the server is unreachable or answers with an error.
pub(crate) async fn run_sync_status(server: &str, api_key: Option<&str>) -> anyhow::Result<()> {
    let url = format!("{}/api/v1/sync/status", server.trim_end_matches('/'));
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;
    let mut request = client.get(&url);
    if let Some(key) = api_key {
        request = request.bearer_auth(key);
    }
    let response = request
        .send()
        .await
        .with_context(|| format!("cannot reach {url}"))?;
    let status = response.status();
    let body: serde_json::Value = response.json().await?;
    if !status.is_success() {
        anyhow::bail!(
            "server answered {status}: {}",
            body["error"]["message"].as_str().unwrap_or("unknown error")
        );
    }

    let data = &body["data"];
    println!("status:   {}", data["status"].as_str().unwrap_or("?"));
    println!("outcome:  {}", data["outcome"].as_str().unwrap_or("?"));
    println!("kind:     {}", data["kind"].as_str().unwrap_or("-"));
    println!("step:     {}", data["current_step"].as_str().unwrap_or(""));
    println!(
        "page:     {} / {}",
        data["current_page"],
        data["total_pages"].as_u64().map_or("?".to_string(), |n| n.to_string())
    );
    println!(
        "records:  seen {} | inserted {} | updated {} | errors {}",
        data["records_seen"], data["inserted"], data["updated"], data["errors"]
    );
    if data["watchdog_expired"].as_bool() == Some(true) {
        println!("warning:  job exceeded the watchdog deadline and may be stuck");
    }
    Ok(())
}

/// List recent runs from `sync_runs`.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub(crate) async fn run_sync_runs(pool: &sqlx::PgPool, limit: i64) -> anyhow::Result<()> {
    let runs = onjn_db::list_sync_runs(pool, limit).await?;
    if runs.is_empty() {
        println!("no sync runs recorded; run `sync registry` first");
        return Ok(());
    }

    println!(
        "{:<22}{:<10}{:<11}{:<11}{:>7}{:>10}{:>10}{:>8}",
        "STARTED", "KIND", "TRIGGER", "STATUS", "PAGES", "INSERTED", "UPDATED", "ERRORS"
    );
    for run in &runs {
        println!(
            "{:<22}{:<10}{:<11}{:<11}{:>7}{:>10}{:>10}{:>8}",
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            run.kind,
            run.trigger_source,
            run.status,
            run.pages_processed,
            run.inserted,
            run.updated,
            run.errors
        );
        if let Some(message) = &run.error_message {
            println!("    {message}");
        }
    }
    Ok(())
}

/// Wait for the job, echoing progress, and write its history row.
async fn drive<S, R>(
    pool: &sqlx::PgPool,
    sync: &RegistrySyncJob<S, R>,
    handle: JoinHandle<SyncJob>,
) -> anyhow::Result<SyncJob>
where
    S: PageSource,
    R: RecordStore + 'static,
{
    let started = sync.jobs().get();
    let kind = started.kind.map_or("registry", onjn_sync::JobKind::as_str);
    let start_time = started.start_time.unwrap_or_else(chrono::Utc::now);
    let run = onjn_db::create_sync_run(pool, kind, CLI_TRIGGER, start_time).await;
    if let Err(e) = &run {
        tracing::warn!(error = %e, "could not record sync run; continuing");
    }

    let progress = spawn_progress(sync.jobs());
    let finished = handle.await.context("sync task panicked")?;
    progress.abort();

    if let Ok(run) = run {
        record_outcome(pool, run.id, &finished).await;
    }
    Ok(finished)
}

fn spawn_progress(jobs: &JobStatusStore) -> JoinHandle<()> {
    let mut rx = jobs.subscribe();
    tokio::spawn(async move {
        let mut last_page = 0;
        while rx.changed().await.is_ok() {
            let job = rx.borrow_and_update().clone();
            if job.status.is_terminal() {
                break;
            }
            if job.current_page != last_page {
                last_page = job.current_page;
                eprintln!(
                    "page {}{}: {} seen, {} inserted, {} updated, {} errors",
                    job.current_page,
                    job.total_pages.map(|t| format!("/{t}")).unwrap_or_default(),
                    job.records_seen,
                    job.inserted,
                    job.updated,
                    job.errors
                );
            }
        }
    })
}

/// Attempt to close the run row, logging any secondary error.
async fn record_outcome(pool: &sqlx::PgPool, run_id: i64, job: &SyncJob) {
    let counters = counters(job);
    let completed_at = job.finished_at.unwrap_or_else(chrono::Utc::now);
    let result = if job.status == SyncStatus::Failed {
        onjn_db::fail_sync_run(pool, run_id, counters, completed_at, &job.current_step).await
    } else {
        onjn_db::complete_sync_run(pool, run_id, counters, completed_at).await
    };
    if let Err(e) = result {
        tracing::error!(run_id, error = %e, "failed to record sync run outcome");
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

fn summarize(job: &SyncJob) -> anyhow::Result<()> {
    if job.status == SyncStatus::Failed {
        anyhow::bail!("sync failed: {}", job.current_step);
    }
    println!(
        "{}: {} pages, {} records seen, {} inserted, {} updated, {} errors",
        job.current_step, job.current_page, job.records_seen, job.inserted, job.updated, job.errors
    );
    Ok(())
}
