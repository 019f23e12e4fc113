//! Bounded time-series persistence
//!
//! [`MetricStore`] keeps one [`TimeSeries`] per metric category plus the
//! alert log in memory. A [`StorageBackend`] mirrors every append to disk.
//! The store is owned by the storage actor, which serializes all access.
//!
//! ## Backends
//!
//! - **JSON lines** (default): one human-readable file per log
//! - **In-memory**: no persistence, for tests or when disabled in config

pub mod backend;
pub mod error;
pub mod export;
pub mod jsonl;
pub mod memory;
pub mod timeseries;

use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::alerts::{AlertEvent, Severity};
use crate::config::{BackendKind, StorageConfig};
use crate::{Category, Sample};

pub use backend::{HealthStatus, LogKind, StorageBackend};
pub use error::{PersistenceError, StorageError, StorageResult};
pub use export::{ExportScope, Snapshot};
pub use jsonl::JsonLinesBackend;
pub use memory::MemoryBackend;
pub use timeseries::{TimeSeries, Timestamped};

/// Build the backend selected in the configuration
pub async fn open_backend(config: &StorageConfig) -> StorageResult<Box<dyn StorageBackend>> {
    match config.backend {
        BackendKind::Jsonl => Ok(Box::new(JsonLinesBackend::new(&config.directory).await?)),
        BackendKind::None => Ok(Box::new(MemoryBackend::new())),
    }
}

/// Alert log query parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertFilter {
    pub severity: Option<Severity>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,

    /// Keep only the most recent `limit` matches
    pub limit: Option<usize>,
}

impl AlertFilter {
    fn matches(&self, alert: &AlertEvent) -> bool {
        self.severity.is_none_or(|severity| alert.severity == severity)
            && self.since.is_none_or(|since| alert.timestamp >= since)
            && self.until.is_none_or(|until| alert.timestamp <= until)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertSummary {
    pub total: usize,
    pub unresolved: usize,
    pub by_severity: BTreeMap<Severity, usize>,
    pub by_metric: BTreeMap<String, usize>,

    /// Alerts raised during the last 24 hours
    pub last_24h: usize,
}

/// In-memory retained records for every log
#[derive(Debug, Clone)]
pub struct MetricStore {
    network: TimeSeries<Sample>,
    system: TimeSeries<Sample>,
    device: TimeSeries<Sample>,
    alerts: TimeSeries<AlertEvent>,
}

impl MetricStore {
    pub fn new(cap: usize) -> Self {
        Self {
            network: TimeSeries::new(cap),
            system: TimeSeries::new(cap),
            device: TimeSeries::new(cap),
            alerts: TimeSeries::new(cap),
        }
    }

    /// Rebuild the store from a backend, keeping the newest `cap` records
    /// per log. Also returns how many records each log holds on disk.
    pub async fn load(
        backend: &dyn StorageBackend,
        cap: usize,
    ) -> StorageResult<(Self, HashMap<LogKind, usize>)> {
        let mut on_disk = HashMap::new();
        let mut store = Self::new(cap);

        for category in Category::ALL {
            let samples = backend.load_samples(category).await?;
            on_disk.insert(LogKind::Samples(category), samples.len());
            *store.series_mut(category) = TimeSeries::from_records(samples, cap);
        }

        let alerts = backend.load_alerts().await?;
        on_disk.insert(LogKind::Alerts, alerts.len());
        store.alerts = TimeSeries::from_records(alerts, cap);

        debug!(
            "loaded store: {} network, {} system, {} device, {} alerts",
            store.network.len(),
            store.system.len(),
            store.device.len(),
            store.alerts.len()
        );

        Ok((store, on_disk))
    }

    pub fn series(&self, category: Category) -> &TimeSeries<Sample> {
        match category {
            Category::Network => &self.network,
            Category::System => &self.system,
            Category::Device => &self.device,
        }
    }

    pub fn series_mut(&mut self, category: Category) -> &mut TimeSeries<Sample> {
        match category {
            Category::Network => &mut self.network,
            Category::System => &mut self.system,
            Category::Device => &mut self.device,
        }
    }

    pub fn alerts(&self) -> &TimeSeries<AlertEvent> {
        &self.alerts
    }

    pub fn alerts_mut(&mut self) -> &mut TimeSeries<AlertEvent> {
        &mut self.alerts
    }

    pub fn len(&self, kind: LogKind) -> usize {
        match kind {
            LogKind::Samples(category) => self.series(category).len(),
            LogKind::Alerts => self.alerts.len(),
        }
    }

    /// Append a sample to its category, evicting the oldest past the cap
    pub fn append(&mut self, sample: Sample) -> Option<Sample> {
        self.series_mut(sample.category()).push(sample)
    }

    pub fn append_alert(&mut self, alert: AlertEvent) -> Option<AlertEvent> {
        self.alerts.push(alert)
    }

    pub fn query(
        &self,
        category: Category,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> impl Iterator<Item = &Sample> + Clone {
        self.series(category).range(since, until)
    }

    pub fn latest(&self, category: Category, n: usize) -> impl Iterator<Item = &Sample> + Clone {
        self.series(category).latest(n)
    }

    /// Samples of a single device in `[since, until]`
    pub fn query_device(
        &self,
        ip: IpAddr,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> impl Iterator<Item = &Sample> + Clone {
        self.device
            .range(since, until)
            .filter(move |sample| sample.device_ip() == Some(ip))
    }

    /// Matching alerts, oldest first
    pub fn query_alerts(&self, filter: &AlertFilter) -> Vec<AlertEvent> {
        let mut matches = self
            .alerts
            .iter()
            .filter(|alert| filter.matches(alert))
            .cloned()
            .collect::<Vec<_>>();

        if let Some(limit) = filter.limit {
            let skip = matches.len().saturating_sub(limit);
            matches.drain(..skip);
        }
        matches
    }

    /// Mark an alert resolved. Returns `false` for unknown ids.
    pub fn resolve_alert(&mut self, id: Uuid) -> bool {
        match self.alerts.iter_mut().find(|alert| alert.id == id) {
            Some(alert) => {
                alert.resolved = true;
                true
            }
            None => false,
        }
    }

    pub fn alert_summary(&self, now: DateTime<Utc>) -> AlertSummary {
        let recent = now - Duration::hours(24);

        self.alerts
            .iter()
            .fold(AlertSummary::default(), |mut summary, alert| {
                summary.total += 1;
                if !alert.resolved {
                    summary.unresolved += 1;
                }
                *summary.by_severity.entry(alert.severity).or_default() += 1;
                *summary
                    .by_metric
                    .entry(alert.metric_name.clone())
                    .or_default() += 1;
                if alert.timestamp >= recent {
                    summary.last_24h += 1;
                }
                summary
            })
    }

    /// Self-contained copy of the records within `[since, until]`
    pub fn snapshot(
        &self,
        scope: ExportScope,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Snapshot {
        let mut snapshot = Snapshot::empty(scope, since, until);

        for category in Category::ALL {
            if scope.includes(LogKind::Samples(category)) {
                *snapshot.samples_mut(category) =
                    self.query(category, since, until).cloned().collect();
            }
        }

        if scope.includes(LogKind::Alerts) {
            snapshot.alerts = self.alerts.range(since, until).cloned().collect();
        }

        snapshot
    }
}
