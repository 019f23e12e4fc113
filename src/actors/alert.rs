//! AlertActor - alert lifecycle
//!
//! Owns the [`AlertManager`] and with it the cooldown state, so the
//! check-and-set for a key happens on a single task. Each admitted alert is
//! persisted first and then handed to the notifier. A failed notification is
//! only logged; the alert stays raised and persisted.

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use super::messages::{AlertCommand, AlertStats};
use super::storage::StorageHandle;
use crate::alerts::{AlertEvent, AlertManager};
use crate::evaluation::CandidateAlert;
use crate::notify::Notifier;

pub struct AlertActor {
    manager: AlertManager,
    notifier: Box<dyn Notifier>,
    recipients: Vec<String>,
    storage: StorageHandle,
    notification_failures: u64,
    command_rx: mpsc::Receiver<AlertCommand>,
}

impl AlertActor {
    pub fn new(
        manager: AlertManager,
        notifier: Box<dyn Notifier>,
        recipients: Vec<String>,
        storage: StorageHandle,
        command_rx: mpsc::Receiver<AlertCommand>,
    ) -> Self {
        Self {
            manager,
            notifier,
            recipients,
            storage,
            notification_failures: 0,
            command_rx,
        }
    }

    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!(
            "starting alert actor (cooldown {:?}, notifier {})",
            self.manager.cooldown().window(),
            self.notifier.name()
        );

        let mut shutdown_ack = None;
        while let Some(cmd) = self.command_rx.recv().await {
            match cmd {
                AlertCommand::Submit {
                    candidates,
                    respond_to,
                } => {
                    let raised = self.submit_all(candidates).await;
                    let _ = respond_to.send(raised);
                }
                AlertCommand::GetStats { respond_to } => {
                    let _ = respond_to.send(self.stats());
                }
                AlertCommand::Shutdown { respond_to } => {
                    debug!("received shutdown command");
                    shutdown_ack = Some(respond_to);
                    break;
                }
            }
        }

        debug!("alert actor stopped");
        if let Some(ack) = shutdown_ack {
            let _ = ack.send(());
        }
    }

    async fn submit_all(&mut self, candidates: Vec<CandidateAlert>) -> Vec<AlertEvent> {
        let mut raised = Vec::new();
        for candidate in candidates {
            if let Some(event) = self.submit(candidate).await {
                raised.push(event);
            }
        }
        raised
    }

    async fn submit(&mut self, candidate: CandidateAlert) -> Option<AlertEvent> {
        let event = self.manager.admit(candidate, Utc::now(), Instant::now())?;
        info!(
            "raised {} alert {}: {}",
            event.severity, event.id, event.message
        );

        match self.storage.append_alert(event.clone()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("alert {} not persisted: {e}", event.id),
            Err(e) => error!("alert {} not persisted, storage unavailable: {e:#}", event.id),
        }

        if let Err(e) = self.notifier.notify(&event, &self.recipients).await {
            self.notification_failures += 1;
            error!("failed to deliver alert {}: {e}", event.id);
        }

        Some(event)
    }

    fn stats(&self) -> AlertStats {
        AlertStats {
            raised: self.manager.raised(),
            suppressed: self.manager.suppressed(),
            notification_failures: self.notification_failures,
            tracked_keys: self.manager.cooldown().len(),
        }
    }
}

/// Handle for talking to the AlertActor
#[derive(Clone)]
pub struct AlertHandle {
    sender: mpsc::Sender<AlertCommand>,
}

impl AlertHandle {
    pub fn spawn(
        manager: AlertManager,
        notifier: Box<dyn Notifier>,
        recipients: Vec<String>,
        storage: StorageHandle,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = AlertActor::new(manager, notifier, recipients, storage, cmd_rx);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Submit candidates, returning the alerts that passed the cooldown
    pub async fn submit(&self, candidates: Vec<CandidateAlert>) -> Result<Vec<AlertEvent>> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(AlertCommand::Submit {
                candidates,
                respond_to: tx,
            })
            .await
            .context("failed to send Submit command")?;

        rx.await.context("failed to receive response")
    }

    pub async fn get_stats(&self) -> Result<AlertStats> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(AlertCommand::GetStats { respond_to: tx })
            .await
            .context("failed to send GetStats command")?;

        rx.await.context("failed to receive response")
    }

    /// Stop the actor and wait until it has finished
    pub async fn shutdown(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(AlertCommand::Shutdown { respond_to: tx })
            .await
            .context("failed to send Shutdown command")?;

        rx.await.context("failed to receive shutdown acknowledgement")
    }
}
