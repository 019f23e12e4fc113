//! In-memory storage backend (no persistence)
//!
//! Used when persistence is disabled and in tests. The store's own series
//! already hold the retained records, so every write here is a no-op and
//! nothing survives a restart.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::debug;

use super::backend::{HealthStatus, StorageBackend};
use super::error::StorageResult;
use crate::alerts::AlertEvent;
use crate::{Category, Sample};

#[derive(Debug, Default)]
pub struct MemoryBackend {
    writes: AtomicU64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of append calls seen so far
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn is_persistent(&self) -> bool {
        false
    }

    async fn load_samples(&self, _category: Category) -> StorageResult<Vec<Sample>> {
        Ok(vec![])
    }

    async fn load_alerts(&self) -> StorageResult<Vec<AlertEvent>> {
        Ok(vec![])
    }

    async fn append_sample(&self, _sample: &Sample) -> StorageResult<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn append_alert(&self, _alert: &AlertEvent) -> StorageResult<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn rewrite_samples(&self, _category: Category, _samples: &[Sample]) -> StorageResult<()> {
        Ok(())
    }

    async fn rewrite_alerts(&self, _alerts: &[AlertEvent]) -> StorageResult<()> {
        Ok(())
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        Ok(HealthStatus {
            healthy: true,
            message: "In-memory storage operational".to_string(),
            metadata: HashMap::from([
                ("backend".to_string(), "memory".to_string()),
                ("writes".to_string(), self.writes().to_string()),
            ]),
        })
    }

    async fn close(&self) -> StorageResult<()> {
        debug!("closing in-memory backend (no-op)");
        Ok(())
    }
}
