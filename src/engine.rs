//! Engine wiring
//!
//! Spawns the storage actor, the alert actor and one collector per metric
//! source. Shutdown runs in dependency order: collectors first (each finishes
//! its in-flight cycle), then the alert actor, then the storage actor, which
//! closes its backend last.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::future::join_all;
use tracing::{debug, error, info, instrument, warn};

use crate::Category;
use crate::actors::{AlertHandle, CollectorHandle, StorageHandle};
use crate::alerts::{AlertManager, CooldownState};
use crate::config::Config;
use crate::evaluation::Evaluator;
use crate::monitors::{DeviceSource, MetricSource, NetworkSource, SystemSource};
use crate::notify::{Notifier, NotifierSet};

/// How long collectors may take to finish their in-flight cycle
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

pub struct Engine {
    storage: StorageHandle,
    alerts: AlertHandle,
    collectors: Vec<CollectorHandle>,
    shutdown_grace: Duration,
}

impl Engine {
    /// Start the engine with the operating system adapters
    #[instrument(skip_all)]
    pub async fn start(config: &Config) -> Result<Self> {
        let storage = StorageHandle::open(&config.storage)
            .await
            .context("failed to start storage")?;

        let notifier = NotifierSet::from_config(&config.alerts);
        info!("alert notifications via {} channel(s)", notifier.len());

        let sources: Vec<Box<dyn MetricSource>> = vec![
            Box::new(NetworkSource::new()),
            Box::new(SystemSource::new()),
            Box::new(DeviceSource::new(
                config.devices.clone(),
                Duration::from_secs(config.ping_timeout_secs),
            )),
        ];

        Ok(Self::with_sources(config, storage, Box::new(notifier), sources))
    }

    /// Start the engine around the given storage, notifier and sources
    pub fn with_sources(
        config: &Config,
        storage: StorageHandle,
        notifier: Box<dyn Notifier>,
        sources: Vec<Box<dyn MetricSource>>,
    ) -> Self {
        let manager = AlertManager::new(CooldownState::new(config.alerts.cooldown()));
        let alerts = AlertHandle::spawn(
            manager,
            notifier,
            config.alerts.recipients.clone(),
            storage.clone(),
        );

        let evaluator = Arc::new(Evaluator::from_config(config));
        let collectors = sources
            .into_iter()
            .map(|source| {
                let every = config.intervals.for_category(source.category());
                debug!("spawning {} collector every {every:?}", source.category());
                CollectorHandle::spawn(
                    source,
                    evaluator.clone(),
                    storage.clone(),
                    alerts.clone(),
                    every,
                )
            })
            .collect();

        Self {
            storage,
            alerts,
            collectors,
            shutdown_grace: SHUTDOWN_GRACE,
        }
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn storage(&self) -> &StorageHandle {
        &self.storage
    }

    pub fn alerts(&self) -> &AlertHandle {
        &self.alerts
    }

    pub fn collectors(&self) -> &[CollectorHandle] {
        &self.collectors
    }

    pub fn collector(&self, category: Category) -> Option<&CollectorHandle> {
        self.collectors.iter().find(|c| c.category() == category)
    }

    /// Stop every actor in dependency order
    #[instrument(skip(self))]
    pub async fn shutdown(self) -> Result<()> {
        info!("shutting down {} collector(s)", self.collectors.len());

        let stopping = join_all(self.collectors.iter().map(|collector| async move {
            if let Err(e) = collector.shutdown().await {
                warn!("{} collector already stopped: {e:#}", collector.category());
            }
        }));
        if tokio::time::timeout(self.shutdown_grace, stopping)
            .await
            .is_err()
        {
            error!(
                "collectors did not stop within {:?}, continuing shutdown",
                self.shutdown_grace
            );
        }

        debug!("stopping alert actor");
        if let Err(e) = self.alerts.shutdown().await {
            warn!("alert actor already stopped: {e:#}");
        }

        debug!("stopping storage actor");
        self.storage
            .shutdown()
            .await
            .context("failed to stop storage actor")?;

        info!("engine stopped");
        Ok(())
    }
}
