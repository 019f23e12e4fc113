use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{error, info, instrument};

use super::{Notifier, http_client};
use crate::alerts::AlertEvent;
use crate::error::NotificationError;

/// Posts a JSON document per alert to an HTTP endpoint
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: http_client(),
            url: url.into(),
        }
    }

    fn payload(alert: &AlertEvent, recipients: &[String]) -> serde_json::Value {
        json!({
            "id": alert.id,
            "subject": alert.subject(),
            "message": alert.message,
            "severity": alert.severity,
            "category": alert.category,
            "metric": alert.metric_name,
            "device_ip": alert.device_ip,
            "value": alert.value,
            "threshold": alert.threshold,
            "recipients": recipients,
            "timestamp": alert.timestamp.to_rfc3339()
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    #[instrument(skip_all, fields(alert = %alert.id))]
    async fn notify(
        &self,
        alert: &AlertEvent,
        recipients: &[String],
    ) -> Result<(), NotificationError> {
        let payload = Self::payload(alert, recipients);

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .inspect_err(|e| error!("Failed to send webhook alert: {e}"))?;

        if !response.status().is_success() {
            error!("Webhook alert failed with status: {}", response.status());
            return Err(NotificationError::Rejected(response.status()));
        }

        info!("Successfully sent webhook alert");
        Ok(())
    }
}
