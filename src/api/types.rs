//! API response types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::actors::{AlertStats, StorageStats};
use crate::alerts::AlertEvent;
use crate::{Category, Sample};

/// Overall API health
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// Storage reachable and its backend healthy
    Ok,
    /// Storage reachable but its backend reports a problem
    Degraded,
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthState::Ok => write!(f, "ok"),
            HealthState::Degraded => write!(f, "degraded"),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthState,
    pub timestamp: String,
    pub storage: String,
}

/// Samples returned by the metric endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct SamplesResponse {
    pub category: Category,
    pub count: usize,
    pub samples: Vec<Sample>,
}

impl SamplesResponse {
    pub fn new(category: Category, samples: Vec<Sample>) -> Self {
        Self {
            category,
            count: samples.len(),
            samples,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AlertsResponse {
    pub count: usize,
    pub alerts: Vec<AlertEvent>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResolveResponse {
    pub id: Uuid,
    pub resolved: bool,
}

/// Engine statistics
#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub timestamp: DateTime<Utc>,
    pub uptime_secs: i64,
    pub collectors: Vec<Category>,
    pub storage: StorageStats,
    pub alerts: AlertStats,
}
