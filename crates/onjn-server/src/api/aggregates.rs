//! On-demand group-by views over the stored records.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use onjn_core::{AggregateReport, AppConfig, Dimension, RecordStore, SlotFilter, SlotStatus};
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState};

const DEFAULT_TOP: usize = 10;
const MAX_TOP: usize = 500;

#[derive(Debug, Default, Deserialize)]
pub(super) struct AggregateQuery {
    pub top: Option<usize>,
    pub county: Option<String>,
    pub city: Option<String>,
    pub company: Option<String>,
    pub brand: Option<String>,
    pub status: Option<SlotStatus>,
    /// Restrict to the operator's own company/brand footprint.
    #[serde(default)]
    pub own: bool,
}

pub(super) async fn get_aggregate(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(dimension): Path<String>,
    Query(query): Query<AggregateQuery>,
) -> Result<Json<ApiResponse<AggregateReport>>, ApiError> {
    let dimension: Dimension = dimension
        .parse()
        .map_err(|e: String| ApiError::new(req_id.0.clone(), "validation_error", e))?;
    let top = query.top.unwrap_or(DEFAULT_TOP).clamp(1, MAX_TOP);
    let filter = build_filter(query, &state.config)
        .map_err(|message| ApiError::new(req_id.0.clone(), "validation_error", message))?;

    let records = state
        .store
        .query_all(&filter)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let report = onjn_core::report(&records, dimension, Some(top));
    tracing::debug!(
        dimension = %dimension,
        records = records.len(),
        buckets = report.bucket_count,
        "aggregate computed"
    );
    Ok(Json(ApiResponse::new(report, req_id.0)))
}

fn build_filter(query: AggregateQuery, config: &AppConfig) -> Result<SlotFilter, String> {
    let mut filter = SlotFilter {
        county: query.county,
        city: query.city,
        company: query.company,
        brand: query.brand,
        status: query.status,
        limit: None,
    };
    if query.own {
        if config.own_company.is_none() && config.own_brand.is_none() {
            return Err(
                "own=true requires ONJN_OWN_COMPANY or ONJN_OWN_BRAND to be configured"
                    .to_string(),
            );
        }
        if config.own_company.is_some() {
            filter.company.clone_from(&config.own_company);
        }
        if config.own_brand.is_some() {
            filter.brand.clone_from(&config.own_brand);
        }
    }
    Ok(filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::test_config;

    #[test]
    fn plain_query_passes_through() {
        let query = AggregateQuery {
            county: Some("Cluj".to_string()),
            status: Some(SlotStatus::Active),
            ..AggregateQuery::default()
        };
        let filter = build_filter(query, &test_config()).unwrap();
        assert_eq!(filter.county.as_deref(), Some("Cluj"));
        assert_eq!(filter.status, Some(SlotStatus::Active));
        assert_eq!(filter.limit, None, "aggregates always see every match");
    }

    #[test]
    fn own_footprint_overrides_company_and_brand() {
        let mut config = test_config();
        config.own_company = Some("Acme Gaming SRL".to_string());
        config.own_brand = Some("Lucky Star".to_string());
        let query = AggregateQuery {
            company: Some("Someone Else".to_string()),
            own: true,
            ..AggregateQuery::default()
        };
        let filter = build_filter(query, &config).unwrap();
        assert_eq!(filter.company.as_deref(), Some("Acme Gaming SRL"));
        assert_eq!(filter.brand.as_deref(), Some("Lucky Star"));
    }

    #[test]
    fn own_footprint_requires_configuration() {
        let query = AggregateQuery {
            own: true,
            ..AggregateQuery::default()
        };
        assert!(build_filter(query, &test_config()).is_err());
    }
}
