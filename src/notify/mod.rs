//! Notification channels for raised alerts
//!
//! A notifier is told about every alert that passed the cooldown. Delivery is
//! attempted once; failures are reported to the caller, which only logs them.

pub mod discord;
pub mod webhook;

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{error, info, warn};

use crate::alerts::{AlertEvent, Severity};
use crate::config::{AlertConfig, NotifierConfig};
use crate::error::NotificationError;

pub use discord::DiscordNotifier;
pub use webhook::WebhookNotifier;

/// Request timeout for HTTP based channels
pub const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait Notifier: Send + Sync + Debug {
    /// Channel name used in logs
    fn name(&self) -> &str;

    async fn notify(
        &self,
        alert: &AlertEvent,
        recipients: &[String],
    ) -> Result<(), NotificationError>;
}

pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(NOTIFY_TIMEOUT)
        .build()
        .unwrap_or_default()
}

/// Writes alerts to the log only
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(
        &self,
        alert: &AlertEvent,
        recipients: &[String],
    ) -> Result<(), NotificationError> {
        match alert.severity {
            Severity::Critical | Severity::High => warn!(
                recipients = recipients.len(),
                "{}: {}",
                alert.subject(),
                alert.message
            ),
            Severity::Medium | Severity::Low => info!(
                recipients = recipients.len(),
                "{}: {}",
                alert.subject(),
                alert.message
            ),
        }
        Ok(())
    }
}

/// Fans an alert out to every configured channel
#[derive(Debug, Default)]
pub struct NotifierSet {
    channels: Vec<Box<dyn Notifier>>,
}

impl NotifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, notifier: impl Notifier + 'static) -> Self {
        self.channels.push(Box::new(notifier));
        self
    }

    pub fn push(&mut self, notifier: Box<dyn Notifier>) {
        self.channels.push(notifier);
    }

    pub fn from_config(config: &AlertConfig) -> Self {
        let mut set = Self::new();
        for channel in &config.channels {
            match channel {
                NotifierConfig::Discord(discord) => set.push(Box::new(DiscordNotifier::new(
                    discord.url.clone(),
                    discord.user_id.clone(),
                ))),
                NotifierConfig::Webhook(webhook) => {
                    set.push(Box::new(WebhookNotifier::new(webhook.url.clone())))
                }
                NotifierConfig::Log => set.push(Box::new(LogNotifier)),
            }
        }

        if set.is_empty() {
            set.push(Box::new(LogNotifier));
        }
        set
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[async_trait]
impl Notifier for NotifierSet {
    fn name(&self) -> &str {
        "set"
    }

    async fn notify(
        &self,
        alert: &AlertEvent,
        recipients: &[String],
    ) -> Result<(), NotificationError> {
        let results = join_all(
            self.channels
                .iter()
                .map(|channel| channel.notify(alert, recipients)),
        )
        .await;

        let mut failed = 0;
        for (channel, result) in self.channels.iter().zip(results) {
            if let Err(e) = result {
                error!("{} notification for alert {} failed: {e}", channel.name(), alert.id);
                failed += 1;
            }
        }

        if failed > 0 {
            return Err(NotificationError::Partial {
                failed,
                total: self.channels.len(),
            });
        }
        Ok(())
    }
}
