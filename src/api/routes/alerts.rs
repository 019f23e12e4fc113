//! Alert log endpoints

use axum::{
    Json,
    extract::{Path, Query, State},
};
use uuid::Uuid;

use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
    types::{AlertsResponse, ResolveResponse},
};
use crate::storage::{AlertFilter, AlertSummary};

/// GET /api/v1/alerts?severity=&since=&until=&limit=
pub async fn list_alerts(
    State(state): State<ApiState>,
    Query(filter): Query<AlertFilter>,
) -> ApiResult<Json<AlertsResponse>> {
    let alerts = state.storage.query_alerts(filter).await?;

    Ok(Json(AlertsResponse {
        count: alerts.len(),
        alerts,
    }))
}

/// GET /api/v1/alerts/summary
pub async fn get_summary(State(state): State<ApiState>) -> ApiResult<Json<AlertSummary>> {
    Ok(Json(state.storage.alert_summary().await?))
}

/// POST /api/v1/alerts/:id/resolve
pub async fn resolve_alert(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ResolveResponse>> {
    if !state.storage.resolve_alert(id).await? {
        return Err(ApiError::NotFound(format!("alert {id} not found")));
    }

    Ok(Json(ResolveResponse { id, resolved: true }))
}
