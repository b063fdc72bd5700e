use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::Utc;
use onjn_core::{OperatorSlotRecord, RecordStore, SlotFilter};
use onjn_db::SlotStats;
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct StatsQuery {
    pub top: Option<i64>,
}

pub(super) async fn list_slots(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(mut filter): Query<SlotFilter>,
) -> Result<Json<ApiResponse<Vec<OperatorSlotRecord>>>, ApiError> {
    filter.limit = Some(normalize_limit(filter.limit));
    let records = state
        .store
        .query_all(&filter)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(records, req_id.0)))
}

pub(super) async fn slot_stats(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<ApiResponse<SlotStats>>, ApiError> {
    let top = query.top.unwrap_or(10).clamp(1, 100);
    let stats = onjn_db::query_stats(&state.pool, Utc::now().date_naive(), top)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(stats, req_id.0)))
}
