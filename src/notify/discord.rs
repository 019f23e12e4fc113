use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{error, info, instrument};

use super::{Notifier, http_client};
use crate::alerts::{AlertEvent, Severity};
use crate::error::NotificationError;

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Default)]
pub struct MessageBuilder {
    content: Option<String>,
    embeds: Vec<Embed>,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(mut self, content: impl ToString) -> Self {
        self.content = Some(content.to_string());
        self
    }

    pub fn add_embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn build(self) -> Message {
        Message {
            content: self.content,
            embeds: self.embeds,
        }
    }
}

fn severity_emoji(severity: Severity) -> &'static str {
    match severity {
        Severity::Low => "🟢",
        Severity::Medium => "🟡",
        Severity::High => "🟠",
        Severity::Critical => "🔴",
    }
}

/// Sends alerts as Discord webhook embeds
#[derive(Debug, Clone)]
pub struct DiscordNotifier {
    client: Client,
    url: String,
    user_id: Option<String>,
}

impl DiscordNotifier {
    pub fn new(url: impl Into<String>, user_id: Option<String>) -> Self {
        Self {
            client: http_client(),
            url: url.into(),
            user_id,
        }
    }

    pub fn build_alert_embed(&self, alert: &AlertEvent, recipients: &[String]) -> Embed {
        let mut fields = vec![
            EmbedField {
                name: "📈 Value".to_string(),
                value: format!("{:.2}", alert.value),
                inline: true,
            },
            EmbedField {
                name: "⚠️ Threshold".to_string(),
                value: format!("{:.2}", alert.threshold),
                inline: true,
            },
            EmbedField {
                name: "🏷️ Metric".to_string(),
                value: format!("{} / {}", alert.category, alert.metric_name),
                inline: true,
            },
        ];

        if let Some(ip) = alert.device_ip {
            fields.push(EmbedField {
                name: "🖧 Device".to_string(),
                value: ip.to_string(),
                inline: true,
            });
        }

        if !recipients.is_empty() {
            fields.push(EmbedField {
                name: "📬 Recipients".to_string(),
                value: recipients.join(", "),
                inline: false,
            });
        }

        Embed {
            title: Some(format!(
                "{} {}",
                severity_emoji(alert.severity),
                alert.subject()
            )),
            description: Some(alert.message.clone()),
            color: Some(alert.severity.color()),
            fields,
            footer: Some(EmbedFooter {
                text: format!("Alert {}", alert.id),
            }),
            timestamp: Some(alert.timestamp.to_rfc3339()),
        }
    }

    pub fn build_message(&self, alert: &AlertEvent, recipients: &[String]) -> Message {
        let mut builder = MessageBuilder::new().add_embed(self.build_alert_embed(alert, recipients));
        if let Some(user_id) = &self.user_id {
            builder = builder.content(format!(
                "{} {} <@{user_id}>",
                severity_emoji(alert.severity),
                alert.message
            ));
        }
        builder.build()
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    fn name(&self) -> &str {
        "discord"
    }

    #[instrument(skip_all, fields(alert = %alert.id))]
    async fn notify(
        &self,
        alert: &AlertEvent,
        recipients: &[String],
    ) -> Result<(), NotificationError> {
        let message = self.build_message(alert, recipients);

        let response = self
            .client
            .post(&self.url)
            .json(&message)
            .send()
            .await
            .inspect_err(|e| error!("Failed to send Discord message: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            error!("Discord message failed with status: {status}");
            if let Ok(error_text) = response.text().await {
                error!("Discord API error response: {error_text}");
            }
            return Err(NotificationError::Rejected(status));
        }

        info!("Successfully sent Discord message");
        Ok(())
    }
}
