//! Storage backend trait definition

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;

use super::error::StorageResult;
use crate::alerts::AlertEvent;
use crate::{Category, Sample};

/// One of the bounded logs kept by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogKind {
    Samples(Category),
    Alerts,
}

impl LogKind {
    pub const ALL: [LogKind; 4] = [
        LogKind::Samples(Category::Network),
        LogKind::Samples(Category::System),
        LogKind::Samples(Category::Device),
        LogKind::Alerts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogKind::Samples(category) => category.as_str(),
            LogKind::Alerts => "alerts",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.jsonl", self.as_str())
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health status of the storage backend
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Additional backend-specific metadata
    pub metadata: HashMap<String, String>,
}

/// Durable side of the store
///
/// The in-memory series are authoritative; a backend only mirrors them. It
/// receives every append and, when the store decides to compact, the full
/// retained contents of a log.
///
/// Implementations must be `Send + Sync` as they are owned by the storage
/// actor task.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether records survive a restart. Non-persistent backends are never
    /// compacted.
    fn is_persistent(&self) -> bool {
        true
    }

    /// All samples on record for a category, oldest first
    async fn load_samples(&self, category: Category) -> StorageResult<Vec<Sample>>;

    async fn load_alerts(&self) -> StorageResult<Vec<AlertEvent>>;

    async fn append_sample(&self, sample: &Sample) -> StorageResult<()>;

    async fn append_alert(&self, alert: &AlertEvent) -> StorageResult<()>;

    /// Replace a sample log with exactly `samples`
    async fn rewrite_samples(&self, category: Category, samples: &[Sample]) -> StorageResult<()>;

    /// Replace the alert log with exactly `alerts`
    async fn rewrite_alerts(&self, alerts: &[AlertEvent]) -> StorageResult<()>;

    /// Lightweight check that the backend is usable
    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Flush and release resources
    async fn close(&self) -> StorageResult<()>;
}
