//! CollectorActor - one timed collection cycle per metric category
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick → MetricSource::collect → for each sample:
//!     StorageActor (recent history) → Evaluator → AlertActor → StorageActor (append)
//!     ↑
//!     └─── Commands (PollNow, Shutdown)
//! ```
//!
//! A cycle runs to completion before the next command is looked at, so a
//! shutdown never interrupts a half-processed tick. Ticks missed while a
//! cycle overran are skipped, not replayed.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{MissedTickBehavior, interval, timeout};
use tracing::{debug, error, instrument, trace, warn};

use super::alert::AlertHandle;
use super::messages::{CollectorCommand, TickReport};
use super::storage::StorageHandle;
use crate::Category;
use crate::error::AdapterError;
use crate::evaluation::Evaluator;
use crate::monitors::MetricSource;

pub struct CollectorActor {
    source: Box<dyn MetricSource>,
    category: Category,
    evaluator: Arc<Evaluator>,
    storage: StorageHandle,
    alerts: AlertHandle,
    interval_duration: Duration,
    command_rx: mpsc::Receiver<CollectorCommand>,
}

impl CollectorActor {
    pub fn new(
        source: Box<dyn MetricSource>,
        evaluator: Arc<Evaluator>,
        storage: StorageHandle,
        alerts: AlertHandle,
        interval_duration: Duration,
        command_rx: mpsc::Receiver<CollectorCommand>,
    ) -> Self {
        Self {
            category: source.category(),
            source,
            evaluator,
            storage,
            alerts,
            interval_duration,
            command_rx,
        }
    }

    #[instrument(skip(self), fields(category = %self.category))]
    pub async fn run(mut self) {
        debug!("starting collector actor (every {:?})", self.interval_duration);

        let mut ticker = interval(self.interval_duration);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut shutdown_ack = None;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        error!("{} cycle skipped: {e:#}", self.category);
                    }
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        CollectorCommand::PollNow { respond_to } => {
                            debug!("received PollNow command");
                            let result = self.tick().await;
                            let _ = respond_to.send(result);
                        }

                        CollectorCommand::Shutdown { respond_to } => {
                            debug!("received shutdown command");
                            shutdown_ack = Some(respond_to);
                            break;
                        }
                    }
                }

                else => {
                    warn!("command channel closed, shutting down");
                    break;
                }
            }
        }

        debug!("collector actor stopped");
        if let Some(ack) = shutdown_ack {
            let _ = ack.send(());
        }
    }

    /// Collect, evaluate, alert and persist one round of samples
    async fn tick(&mut self) -> Result<TickReport> {
        let samples = match timeout(self.interval_duration, self.source.collect()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(AdapterError::Timeout {
                    category: self.category,
                    millis: self.interval_duration.as_millis(),
                }
                .into());
            }
        };

        let history_len = self.evaluator.history_len(self.category);
        let mut report = TickReport {
            samples: samples.len(),
            ..Default::default()
        };

        for sample in samples {
            let history = if history_len > 0 {
                self.storage
                    .latest(self.category, history_len)
                    .await
                    .context("failed to read recent history")?
            } else {
                vec![]
            };

            let candidates = self.evaluator.evaluate(&sample, &history);
            report.candidates += candidates.len();

            if !candidates.is_empty() {
                let raised = self
                    .alerts
                    .submit(candidates)
                    .await
                    .context("failed to submit candidate alerts")?;
                report.raised += raised.len();
            }

            let persisted = self
                .storage
                .append(sample)
                .await
                .context("failed to store sample")?;
            if let Err(e) = persisted {
                report.persistence_failures += 1;
                warn!("{} sample not persisted: {e}", self.category);
            }
        }

        trace!("{} cycle finished: {report:?}", self.category);
        Ok(report)
    }
}

/// Handle for controlling a CollectorActor
#[derive(Clone)]
pub struct CollectorHandle {
    sender: mpsc::Sender<CollectorCommand>,
    category: Category,
}

impl CollectorHandle {
    pub fn spawn(
        source: Box<dyn MetricSource>,
        evaluator: Arc<Evaluator>,
        storage: StorageHandle,
        alerts: AlertHandle,
        interval_duration: Duration,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let category = source.category();

        let actor =
            CollectorActor::new(source, evaluator, storage, alerts, interval_duration, cmd_rx);
        tokio::spawn(actor.run());

        Self {
            sender: cmd_tx,
            category,
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// Run a cycle now, bypassing the interval timer
    pub async fn poll_now(&self) -> Result<TickReport> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(CollectorCommand::PollNow { respond_to: tx })
            .await
            .context("failed to send PollNow command")?;

        rx.await.context("failed to receive response")?
    }

    /// Stop after the in-flight cycle and wait for the actor to exit
    pub async fn shutdown(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(CollectorCommand::Shutdown { respond_to: tx })
            .await
            .context("failed to send Shutdown command")?;

        rx.await.context("failed to receive shutdown acknowledgement")
    }
}
