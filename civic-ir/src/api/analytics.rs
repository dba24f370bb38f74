//! Analytics endpoints (admin only)

use axum::{extract::State, Json};

use crate::api::auth::{caller_of, Identity};
use crate::error::ApiResult;
use crate::services::analytics::{HotspotReport, MonthlyBucket, Summary};
use crate::AppState;

/// GET /analytics/summary
pub async fn summary(State(state): State<AppState>, identity: Identity) -> ApiResult<Json<Summary>> {
    Ok(Json(state.analytics.summary(caller_of(&identity)).await?))
}

/// GET /analytics/monthly
pub async fn monthly(
    State(state): State<AppState>,
    identity: Identity,
) -> ApiResult<Json<Vec<MonthlyBucket>>> {
    Ok(Json(state.analytics.monthly_trend(caller_of(&identity)).await?))
}

/// GET /analytics/hotspots
pub async fn hotspots(
    State(state): State<AppState>,
    identity: Identity,
) -> ApiResult<Json<HotspotReport>> {
    Ok(Json(state.analytics.hotspots(caller_of(&identity)).await?))
}
