//! Engine statistics endpoint

use axum::{Json, extract::State};
use chrono::Utc;

use crate::api::{error::ApiResult, state::ApiState, types::StatsResponse};

/// GET /api/v1/stats
///
/// Returns storage counters, alert counters and the running collectors
pub async fn get_stats(State(state): State<ApiState>) -> ApiResult<Json<StatsResponse>> {
    let storage = state.storage.get_stats().await?;
    let alerts = state.alerts.get_stats().await?;
    let now = Utc::now();

    Ok(Json(StatsResponse {
        timestamp: now,
        uptime_secs: (now - state.started_at).num_seconds(),
        collectors: state.collectors.clone(),
        storage,
        alerts,
    }))
}
