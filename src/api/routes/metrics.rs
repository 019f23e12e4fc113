//! Metric sample endpoints

use std::net::IpAddr;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::Category;
use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
    types::SamplesResponse,
};

const DEFAULT_LIMIT: usize = 1000;

/// Query parameters for time range queries
#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    /// Start time (default: 1 hour ago)
    #[serde(default = "default_since")]
    pub since: DateTime<Utc>,

    /// End time (default: now)
    #[serde(default = "Utc::now")]
    pub until: DateTime<Utc>,

    /// Maximum number of samples, the newest are kept (default: 1000)
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl RangeQuery {
    fn validate(&self) -> ApiResult<()> {
        if self.since > self.until {
            return Err(ApiError::InvalidRequest(
                "'since' must not be after 'until'".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct LatestQuery {
    #[serde(default = "default_latest")]
    pub limit: usize,
}

fn default_since() -> DateTime<Utc> {
    Utc::now() - Duration::hours(1)
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

fn default_latest() -> usize {
    1
}

fn keep_newest<T>(mut items: Vec<T>, limit: usize) -> Vec<T> {
    if items.len() > limit {
        items.drain(..items.len() - limit);
    }
    items
}

/// GET /api/v1/metrics/:category
pub async fn get_metrics(
    State(state): State<ApiState>,
    Path(category): Path<Category>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Json<SamplesResponse>> {
    query.validate()?;

    let samples = state
        .storage
        .query(category, query.since, query.until)
        .await?;

    Ok(Json(SamplesResponse::new(
        category,
        keep_newest(samples, query.limit),
    )))
}

/// GET /api/v1/metrics/:category/latest
pub async fn get_latest_metrics(
    State(state): State<ApiState>,
    Path(category): Path<Category>,
    Query(query): Query<LatestQuery>,
) -> ApiResult<Json<SamplesResponse>> {
    let samples = state.storage.latest(category, query.limit).await?;
    Ok(Json(SamplesResponse::new(category, samples)))
}

/// GET /api/v1/devices/:ip/samples
pub async fn get_device_samples(
    State(state): State<ApiState>,
    Path(ip): Path<IpAddr>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Json<SamplesResponse>> {
    query.validate()?;

    let samples = state
        .storage
        .query_device(ip, query.since, query.until)
        .await?;

    Ok(Json(SamplesResponse::new(
        Category::Device,
        keep_newest(samples, query.limit),
    )))
}
