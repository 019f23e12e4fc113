//! StorageActor - single owner of the metric store
//!
//! All appends and queries go through this actor's command channel, so an
//! append together with its eviction is atomic with respect to queries.
//!
//! Every append is mirrored to the backend right away. When a log holds more
//! than `cap + compaction_slack` records on disk, the actor rewrites it from
//! the in-memory series.

use std::collections::HashMap;
use std::net::IpAddr;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, instrument, trace, warn};
use uuid::Uuid;

use super::messages::{StorageCommand, StorageStats};
use crate::alerts::AlertEvent;
use crate::config::StorageConfig;
use crate::storage::{
    AlertFilter, AlertSummary, ExportScope, HealthStatus, LogKind, MemoryBackend, MetricStore,
    PersistenceError, Snapshot, StorageBackend, StorageResult, open_backend,
};
use crate::{Category, Sample};

pub struct StorageActor {
    store: MetricStore,
    backend: Box<dyn StorageBackend>,

    /// Records per log currently in the backend
    on_disk: HashMap<LogKind, usize>,

    cap: usize,
    compaction_slack: usize,

    appends: u64,
    compactions: u64,
    persistence_failures: u64,

    command_rx: mpsc::Receiver<StorageCommand>,
}

impl StorageActor {
    pub fn new(
        store: MetricStore,
        on_disk: HashMap<LogKind, usize>,
        backend: Box<dyn StorageBackend>,
        cap: usize,
        compaction_slack: usize,
        command_rx: mpsc::Receiver<StorageCommand>,
    ) -> Self {
        debug!(
            "creating storage actor with {} backend (cap {cap}, slack {compaction_slack})",
            backend.name()
        );

        Self {
            store,
            backend,
            on_disk,
            cap,
            compaction_slack,
            appends: 0,
            compactions: 0,
            persistence_failures: 0,
            command_rx,
        }
    }

    #[instrument(skip(self), fields(backend = self.backend.name()))]
    pub async fn run(mut self) {
        debug!("starting storage actor");

        // logs that outgrew the cap while the engine was down
        for kind in LogKind::ALL {
            self.compact_if_needed(kind).await;
        }

        let mut shutdown_ack = None;
        while let Some(cmd) = self.command_rx.recv().await {
            if let StorageCommand::Shutdown { respond_to } = cmd {
                debug!("received shutdown command");
                shutdown_ack = Some(respond_to);
                break;
            }
            self.handle_command(cmd).await;
        }

        debug!("closing backend");
        if let Err(e) = self.backend.close().await {
            error!("error closing backend: {e}");
        }

        debug!("storage actor stopped");
        if let Some(ack) = shutdown_ack {
            let _ = ack.send(());
        }
    }

    async fn handle_command(&mut self, cmd: StorageCommand) {
        match cmd {
            StorageCommand::Append { sample, respond_to } => {
                let result = self.append(sample).await;
                let _ = respond_to.send(result);
            }

            StorageCommand::AppendAlert { alert, respond_to } => {
                let result = self.append_alert(alert).await;
                let _ = respond_to.send(result);
            }

            StorageCommand::Query {
                category,
                since,
                until,
                respond_to,
            } => {
                let samples = self.store.query(category, since, until).cloned().collect();
                let _ = respond_to.send(samples);
            }

            StorageCommand::Latest {
                category,
                n,
                respond_to,
            } => {
                let samples = self.store.latest(category, n).cloned().collect();
                let _ = respond_to.send(samples);
            }

            StorageCommand::QueryDevice {
                ip,
                since,
                until,
                respond_to,
            } => {
                let samples = self.store.query_device(ip, since, until).cloned().collect();
                let _ = respond_to.send(samples);
            }

            StorageCommand::QueryAlerts { filter, respond_to } => {
                let _ = respond_to.send(self.store.query_alerts(&filter));
            }

            StorageCommand::ResolveAlert { id, respond_to } => {
                let resolved = self.resolve_alert(id).await;
                let _ = respond_to.send(resolved);
            }

            StorageCommand::AlertSummary { respond_to } => {
                let _ = respond_to.send(self.store.alert_summary(Utc::now()));
            }

            StorageCommand::Export {
                scope,
                since,
                until,
                respond_to,
            } => {
                let _ = respond_to.send(self.store.snapshot(scope, since, until));
            }

            StorageCommand::GetStats { respond_to } => {
                let _ = respond_to.send(self.stats());
            }

            StorageCommand::HealthCheck { respond_to } => {
                let _ = respond_to.send(self.backend.health_check().await);
            }

            StorageCommand::Shutdown { .. } => {}
        }
    }

    async fn append(&mut self, sample: Sample) -> Result<(), PersistenceError> {
        let category = sample.category();
        let kind = LogKind::Samples(category);
        trace!("storing {category} sample at {}", sample.timestamp);

        self.store.append(sample);

        // persist the record as stored, after timestamp clamping
        let Some(stored) = self.store.series(category).newest() else {
            return Ok(());
        };
        let result = self.backend.append_sample(stored).await;
        self.record_append(kind, result).await
    }

    async fn append_alert(&mut self, alert: AlertEvent) -> Result<(), PersistenceError> {
        trace!("storing alert {}", alert.id);

        self.store.append_alert(alert);

        let Some(stored) = self.store.alerts().newest() else {
            return Ok(());
        };
        let result = self.backend.append_alert(stored).await;
        self.record_append(LogKind::Alerts, result).await
    }

    async fn record_append(
        &mut self,
        kind: LogKind,
        result: Result<(), PersistenceError>,
    ) -> Result<(), PersistenceError> {
        self.appends += 1;

        if let Err(e) = result {
            self.persistence_failures += 1;
            warn!("{kind} record kept in memory only: {e}");
            return Err(e);
        }

        *self.on_disk.entry(kind).or_default() += 1;
        self.compact_if_needed(kind).await;
        Ok(())
    }

    /// Rewrite a log from memory once it exceeds `cap + compaction_slack`
    async fn compact_if_needed(&mut self, kind: LogKind) {
        if !self.backend.is_persistent() {
            return;
        }

        let stored = self.on_disk.get(&kind).copied().unwrap_or_default();
        if stored <= self.cap + self.compaction_slack {
            return;
        }

        if let Err(e) = self.rewrite(kind).await {
            self.persistence_failures += 1;
            error!("failed to compact {kind} log: {e}");
            return;
        }

        self.compactions += 1;
        info!(
            "compacted {kind} log from {stored} to {} records",
            self.store.len(kind)
        );
    }

    async fn rewrite(&mut self, kind: LogKind) -> StorageResult<()> {
        let retained = match kind {
            LogKind::Samples(category) => {
                let samples = self.store.series_mut(category).as_slice();
                self.backend.rewrite_samples(category, samples).await?;
                samples.len()
            }
            LogKind::Alerts => {
                let alerts = self.store.alerts_mut().as_slice();
                self.backend.rewrite_alerts(alerts).await?;
                alerts.len()
            }
        };

        self.on_disk.insert(kind, retained);
        Ok(())
    }

    async fn resolve_alert(&mut self, id: Uuid) -> bool {
        if !self.store.resolve_alert(id) {
            return false;
        }

        debug!("alert {id} resolved");
        if self.backend.is_persistent() {
            if let Err(e) = self.rewrite(LogKind::Alerts).await {
                self.persistence_failures += 1;
                warn!("resolution of alert {id} kept in memory only: {e}");
            }
        }
        true
    }

    fn stats(&self) -> StorageStats {
        StorageStats {
            backend: self.backend.name().to_string(),
            records: LogKind::ALL
                .into_iter()
                .map(|kind| (kind.to_string(), self.store.len(kind)))
                .collect(),
            appends: self.appends,
            compactions: self.compactions,
            persistence_failures: self.persistence_failures,
        }
    }
}

/// Handle for talking to the StorageActor
#[derive(Clone)]
pub struct StorageHandle {
    sender: mpsc::Sender<StorageCommand>,
}

impl StorageHandle {
    /// Spawn a storage actor around an already loaded store
    pub fn spawn(
        store: MetricStore,
        on_disk: HashMap<LogKind, usize>,
        backend: Box<dyn StorageBackend>,
        cap: usize,
        compaction_slack: usize,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);

        let actor = StorageActor::new(store, on_disk, backend, cap, compaction_slack, cmd_rx);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Open the configured backend, load its logs and spawn the actor
    pub async fn open(config: &StorageConfig) -> Result<Self> {
        let backend = open_backend(config)
            .await
            .context("failed to open storage backend")?;
        let (store, on_disk) = MetricStore::load(backend.as_ref(), config.max_records)
            .await
            .context("failed to load stored records")?;

        Ok(Self::spawn(
            store,
            on_disk,
            backend,
            config.max_records,
            config.compaction_slack(),
        ))
    }

    /// Spawn an actor without persistence
    pub fn in_memory(cap: usize) -> Self {
        Self::spawn(
            MetricStore::new(cap),
            HashMap::new(),
            Box::new(MemoryBackend::new()),
            cap,
            (cap / 10).max(1),
        )
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> StorageCommand,
        name: &'static str,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(command(tx))
            .await
            .with_context(|| format!("failed to send {name} command"))?;
        rx.await
            .with_context(|| format!("failed to receive {name} response"))
    }

    /// Append a sample. The outer error means the actor is gone; the inner
    /// one that the sample was kept in memory but not persisted.
    pub async fn append(&self, sample: Sample) -> Result<Result<(), PersistenceError>> {
        self.request(
            |respond_to| StorageCommand::Append { sample, respond_to },
            "Append",
        )
        .await
    }

    pub async fn append_alert(&self, alert: AlertEvent) -> Result<Result<(), PersistenceError>> {
        self.request(
            |respond_to| StorageCommand::AppendAlert { alert, respond_to },
            "AppendAlert",
        )
        .await
    }

    /// Samples of `category` in `[since, until]`, oldest first
    pub async fn query(
        &self,
        category: Category,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Sample>> {
        self.request(
            |respond_to| StorageCommand::Query {
                category,
                since,
                until,
                respond_to,
            },
            "Query",
        )
        .await
    }

    /// The most recent `n` samples of `category`, oldest first
    pub async fn latest(&self, category: Category, n: usize) -> Result<Vec<Sample>> {
        self.request(
            |respond_to| StorageCommand::Latest {
                category,
                n,
                respond_to,
            },
            "Latest",
        )
        .await
    }

    pub async fn query_device(
        &self,
        ip: IpAddr,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Sample>> {
        self.request(
            |respond_to| StorageCommand::QueryDevice {
                ip,
                since,
                until,
                respond_to,
            },
            "QueryDevice",
        )
        .await
    }

    pub async fn query_alerts(&self, filter: AlertFilter) -> Result<Vec<AlertEvent>> {
        self.request(
            |respond_to| StorageCommand::QueryAlerts { filter, respond_to },
            "QueryAlerts",
        )
        .await
    }

    /// Mark an alert resolved. `false` if no alert has that id.
    pub async fn resolve_alert(&self, id: Uuid) -> Result<bool> {
        self.request(
            |respond_to| StorageCommand::ResolveAlert { id, respond_to },
            "ResolveAlert",
        )
        .await
    }

    pub async fn alert_summary(&self) -> Result<AlertSummary> {
        self.request(
            |respond_to| StorageCommand::AlertSummary { respond_to },
            "AlertSummary",
        )
        .await
    }

    pub async fn export(
        &self,
        scope: ExportScope,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Snapshot> {
        self.request(
            |respond_to| StorageCommand::Export {
                scope,
                since,
                until,
                respond_to,
            },
            "Export",
        )
        .await
    }

    pub async fn get_stats(&self) -> Result<StorageStats> {
        self.request(
            |respond_to| StorageCommand::GetStats { respond_to },
            "GetStats",
        )
        .await
    }

    pub async fn health_check(&self) -> Result<HealthStatus> {
        let status = self
            .request(
                |respond_to| StorageCommand::HealthCheck { respond_to },
                "HealthCheck",
            )
            .await?;
        Ok(status?)
    }

    /// Close the backend and wait for the actor to stop
    pub async fn shutdown(&self) -> Result<()> {
        self.request(
            |respond_to| StorageCommand::Shutdown { respond_to },
            "Shutdown",
        )
        .await
    }
}
