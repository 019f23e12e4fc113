use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::Category;
use crate::evaluation::CandidateAlert;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// RGB colour used when rendering an alert
    pub fn color(&self) -> u32 {
        match self {
            Severity::Low => 0x28a745,
            Severity::Medium => 0xffc107,
            Severity::High => 0xfd7e14,
            Severity::Critical => 0xdc3545,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

/// Identity under which repeated alerts are suppressed
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AlertKey {
    Metric { category: Category, metric: String },
    /// All alerts of one device share a key
    Device { ip: IpAddr },
}

impl fmt::Display for AlertKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertKey::Metric { category, metric } => write!(f, "{category}/{metric}"),
            AlertKey::Device { ip } => write!(f, "device/{ip}"),
        }
    }
}

/// A raised alert, as persisted in the alert log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub category: Category,
    pub metric_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_ip: Option<IpAddr>,
    pub severity: Severity,
    pub message: String,
    pub value: f64,
    pub threshold: f64,
    #[serde(default)]
    pub resolved: bool,
}

impl AlertEvent {
    pub fn raise(candidate: CandidateAlert, timestamp: DateTime<Utc>) -> Self {
        let CandidateAlert {
            category,
            metric_name,
            device_ip,
            severity,
            message,
            value,
            threshold,
        } = candidate;

        Self {
            id: Uuid::new_v4(),
            timestamp,
            category,
            metric_name,
            device_ip,
            severity,
            message,
            value,
            threshold,
            resolved: false,
        }
    }

    /// Subject line used by notification channels
    pub fn subject(&self) -> String {
        let target = match self.device_ip {
            Some(ip) => format!("{} ({ip})", self.metric_name),
            None => self.metric_name.clone(),
        };
        format!(
            "[{}] Network Alert: {target}",
            self.severity.as_str().to_uppercase()
        )
    }
}

/// Last raise instant per alert key
///
/// Elapsed time is measured on the monotonic clock, so wall clock steps
/// never stretch or skip a cooldown.
#[derive(Debug, Clone)]
pub struct CooldownState {
    window: StdDuration,
    last_raised: HashMap<AlertKey, Instant>,
}

impl CooldownState {
    pub fn new(window: StdDuration) -> Self {
        Self {
            window,
            last_raised: HashMap::new(),
        }
    }

    pub fn window(&self) -> StdDuration {
        self.window
    }

    pub fn last_raised(&self, key: &AlertKey) -> Option<Instant> {
        self.last_raised.get(key).copied()
    }

    pub fn is_cooling_down(&self, key: &AlertKey, now: Instant) -> bool {
        self.last_raised
            .get(key)
            .is_some_and(|last| now.saturating_duration_since(*last) < self.window)
    }

    /// Record a raise at `now` unless the key is still cooling down.
    /// Returns whether the raise was recorded.
    pub fn check_and_set(&mut self, key: AlertKey, now: Instant) -> bool {
        if self.is_cooling_down(&key, now) {
            return false;
        }
        self.last_raised.insert(key, now);
        true
    }

    pub fn len(&self) -> usize {
        self.last_raised.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_raised.is_empty()
    }
}

/// Turns candidates into alert events, subject to the cooldown policy
#[derive(Debug)]
pub struct AlertManager {
    cooldown: CooldownState,
    raised: u64,
    suppressed: u64,
}

impl AlertManager {
    pub fn new(cooldown: CooldownState) -> Self {
        Self {
            cooldown,
            raised: 0,
            suppressed: 0,
        }
    }

    /// Admit a candidate observed at `at`, stamping the event with `timestamp`
    pub fn admit(
        &mut self,
        candidate: CandidateAlert,
        timestamp: DateTime<Utc>,
        at: Instant,
    ) -> Option<AlertEvent> {
        let key = candidate.key();

        if !self.cooldown.check_and_set(key.clone(), at) {
            self.suppressed += 1;
            debug!(
                "suppressed {} alert for {key}: {}",
                candidate.severity, candidate.message
            );
            return None;
        }

        self.raised += 1;
        trace!("raising {} alert for {key}", candidate.severity);
        Some(AlertEvent::raise(candidate, timestamp))
    }

    pub fn cooldown(&self) -> &CooldownState {
        &self.cooldown
    }

    pub fn raised(&self) -> u64 {
        self.raised
    }

    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }
}
