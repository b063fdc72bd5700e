//! Job-control endpoints. Triggers return as soon as the job is accepted;
//! clients poll `/sync/status` for progress.

use std::path::PathBuf;
use std::time::Duration;

use axum::{body::Bytes, extract::State, http::StatusCode, Extension, Json};
use chrono::Utc;
use onjn_sync::{SyncError, SyncStatusView};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{ApiError, ApiResponse, AppState};

pub(super) const API_TRIGGER: &str = "api";

#[derive(Debug, Default, Deserialize)]
pub(super) struct StartSyncRequest {
    pub max_pages: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct ImportSnapshotRequest {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub(super) struct SyncAccepted {
    accepted: bool,
    status: SyncStatusView,
}

type Accepted = (StatusCode, Json<ApiResponse<SyncAccepted>>);

pub(super) async fn start_sync(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: Bytes,
) -> Result<Accepted, ApiError> {
    let request: StartSyncRequest = parse_optional_body(&body, &req_id)?;
    match state.sync.start(request.max_pages, API_TRIGGER) {
        Ok(_handle) => Ok(accepted(&state, req_id)),
        Err(e) => Err(map_sync_error(req_id.0, &e)),
    }
}

pub(super) async fn import_snapshot(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: Bytes,
) -> Result<Accepted, ApiError> {
    let request: ImportSnapshotRequest = parse_optional_body(&body, &req_id)?;
    match state.sync.import_from_snapshot(request.path, API_TRIGGER) {
        Ok(_handle) => Ok(accepted(&state, req_id)),
        Err(e) => Err(map_sync_error(req_id.0, &e)),
    }
}

pub(super) async fn sync_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<SyncStatusView>> {
    Json(ApiResponse::new(status_view(&state), req_id.0))
}

fn status_view(state: &AppState) -> SyncStatusView {
    state.sync.jobs().observe(
        Utc::now(),
        Duration::from_secs(state.config.sync_stale_after_secs),
    )
}

fn accepted(state: &AppState, req_id: RequestId) -> Accepted {
    (
        StatusCode::ACCEPTED,
        Json(ApiResponse::new(
            SyncAccepted {
                accepted: true,
                status: status_view(state),
            },
            req_id.0,
        )),
    )
}

/// An empty body means "all defaults".
fn parse_optional_body<T>(body: &[u8], req_id: &RequestId) -> Result<T, ApiError>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        ApiError::new(
            req_id.0.clone(),
            "validation_error",
            format!("invalid request body: {e}"),
        )
    })
}

pub(super) fn map_sync_error(request_id: String, error: &SyncError) -> ApiError {
    match error {
        SyncError::AlreadyRunning { .. } => {
            tracing::info!(error = %error, "sync trigger rejected");
            ApiError::new(request_id, "already_running", error.to_string())
        }
        SyncError::Snapshot(_) => {
            tracing::error!(error = %error, "sync trigger failed");
            ApiError::new(request_id, "internal_error", error.to_string())
        }
    }
}
