//! API shared state containing actor handles

use chrono::{DateTime, Utc};

use crate::Category;
use crate::actors::{AlertHandle, StorageHandle};
use crate::engine::Engine;

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Handle to the storage actor for samples and alerts
    pub storage: StorageHandle,

    /// Handle to the alert actor for alert statistics
    pub alerts: AlertHandle,

    /// Categories with a running collector
    pub collectors: Vec<Category>,

    pub started_at: DateTime<Utc>,
}

impl ApiState {
    pub fn new(storage: StorageHandle, alerts: AlertHandle, collectors: Vec<Category>) -> Self {
        Self {
            storage,
            alerts,
            collectors,
            started_at: Utc::now(),
        }
    }

    pub fn from_engine(engine: &Engine) -> Self {
        Self::new(
            engine.storage().clone(),
            engine.alerts().clone(),
            engine.collectors().iter().map(|c| c.category()).collect(),
        )
    }
}
