use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct SyncRunsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct SyncRunItem {
    sync_run_id: Uuid,
    kind: String,
    trigger_source: String,
    status: String,
    pages_processed: i64,
    records_seen: i64,
    inserted: i64,
    updated: i64,
    errors: i64,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
}

impl From<onjn_db::SyncRunRow> for SyncRunItem {
    fn from(row: onjn_db::SyncRunRow) -> Self {
        Self {
            sync_run_id: row.public_id,
            kind: row.kind,
            trigger_source: row.trigger_source,
            status: row.status,
            pages_processed: row.pages_processed,
            records_seen: row.records_seen,
            inserted: row.inserted,
            updated: row.updated,
            errors: row.errors,
            started_at: row.started_at,
            completed_at: row.completed_at,
            error_message: row.error_message,
        }
    }
}

pub(super) async fn list_sync_runs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<SyncRunsQuery>,
) -> Result<Json<ApiResponse<Vec<SyncRunItem>>>, ApiError> {
    let rows = onjn_db::list_sync_runs(&state.pool, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows.into_iter().map(SyncRunItem::from).collect();
    Ok(Json(ApiResponse::new(data, req_id.0)))
}
