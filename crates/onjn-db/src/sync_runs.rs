//! Database operations for `sync_runs`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

const RETURNING_COLUMNS: &str = "id, public_id, kind, trigger_source, status, pages_processed, \
     records_seen, inserted, updated, errors, started_at, completed_at, error_message, created_at";

/// A row from the `sync_runs` table.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SyncRunRow {
    #[serde(skip)]
    pub id: i64,
    pub public_id: Uuid,
    pub kind: String,
    pub trigger_source: String,
    pub status: String,
    pub pages_processed: i64,
    pub records_seen: i64,
    pub inserted: i64,
    pub updated: i64,
    pub errors: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Final counters written when a run ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncRunCounters {
    pub pages_processed: i64,
    pub records_seen: i64,
    pub inserted: i64,
    pub updated: i64,
    pub errors: i64,
}

/// Records a run in `running` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_sync_run(
    pool: &PgPool,
    kind: &str,
    trigger_source: &str,
    started_at: DateTime<Utc>,
) -> Result<SyncRunRow, DbError> {
    let sql = format!(
        "INSERT INTO sync_runs (public_id, kind, trigger_source, status, started_at) \
         VALUES ($1, $2, $3, 'running', $4) \
         RETURNING {RETURNING_COLUMNS}"
    );
    let row = sqlx::query_as::<_, SyncRunRow>(&sql)
        .bind(Uuid::new_v4())
        .bind(kind)
        .bind(trigger_source)
        .bind(started_at)
        .fetch_one(pool)
        .await?;

    Ok(row)
}

/// Marks a `running` run as `succeeded` with its final counters.
///
/// # Errors
///
/// Returns [`DbError::InvalidSyncRunTransition`] if the run is not
/// `running`, or [`DbError::Sqlx`] if the update fails.
pub async fn complete_sync_run(
    pool: &PgPool,
    id: i64,
    counters: SyncRunCounters,
    completed_at: DateTime<Utc>,
) -> Result<(), DbError> {
    finish_sync_run(pool, id, "succeeded", counters, completed_at, None).await
}

/// Marks a `running` run as `failed` with its final counters and cause.
///
/// # Errors
///
/// Returns [`DbError::InvalidSyncRunTransition`] if the run is not
/// `running`, or [`DbError::Sqlx`] if the update fails.
pub async fn fail_sync_run(
    pool: &PgPool,
    id: i64,
    counters: SyncRunCounters,
    completed_at: DateTime<Utc>,
    error_message: &str,
) -> Result<(), DbError> {
    finish_sync_run(pool, id, "failed", counters, completed_at, Some(error_message)).await
}

async fn finish_sync_run(
    pool: &PgPool,
    id: i64,
    status: &str,
    counters: SyncRunCounters,
    completed_at: DateTime<Utc>,
    error_message: Option<&str>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE sync_runs \
         SET status = $1, completed_at = $2, error_message = $3, \
             pages_processed = $4, records_seen = $5, inserted = $6, \
             updated = $7, errors = $8 \
         WHERE id = $9 AND status = 'running'",
    )
    .bind(status)
    .bind(completed_at)
    .bind(error_message)
    .bind(counters.pages_processed)
    .bind(counters.records_seen)
    .bind(counters.inserted)
    .bind(counters.updated)
    .bind(counters.errors)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidSyncRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Fetches a single run by its internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_sync_run(pool: &PgPool, id: i64) -> Result<SyncRunRow, DbError> {
    let sql = format!("SELECT {RETURNING_COLUMNS} FROM sync_runs WHERE id = $1");
    sqlx::query_as::<_, SyncRunRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Returns the most recent `limit` runs, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_sync_runs(pool: &PgPool, limit: i64) -> Result<Vec<SyncRunRow>, DbError> {
    let sql = format!(
        "SELECT {RETURNING_COLUMNS} FROM sync_runs ORDER BY created_at DESC, id DESC LIMIT $1"
    );
    let rows = sqlx::query_as::<_, SyncRunRow>(&sql)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}
