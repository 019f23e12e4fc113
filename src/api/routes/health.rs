//! Health check endpoint

use axum::{Json, extract::State};

use crate::api::{
    error::ApiResult,
    state::ApiState,
    types::{HealthResponse, HealthState},
};

/// GET /api/v1/health
///
/// `ok` while the storage backend is healthy, `degraded` otherwise
pub async fn health_check(State(state): State<ApiState>) -> ApiResult<Json<HealthResponse>> {
    let backend = state.storage.health_check().await?;

    let status = if backend.healthy {
        HealthState::Ok
    } else {
        HealthState::Degraded
    };

    Ok(Json(HealthResponse {
        status,
        timestamp: chrono::Utc::now().to_rfc3339(),
        storage: backend.message,
    }))
}
