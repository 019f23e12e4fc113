use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{trace, warn};

use crate::Category;
use crate::alerts::Severity;
use crate::error::ConfigError;

/// Top-level engine configuration
///
/// Every section has defaults, so `{}` is a valid configuration file.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub thresholds: Thresholds,

    #[serde(default)]
    pub anomaly: AnomalyConfig,

    #[serde(default)]
    pub intervals: Intervals,

    /// Hosts pinged by the device cycle
    #[serde(default = "default_devices")]
    pub devices: Vec<IpAddr>,

    #[serde(default = "default_ping_timeout")]
    pub ping_timeout_secs: u64,

    #[serde(default)]
    pub alerts: AlertConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Read API (disabled when absent)
    pub api: Option<ApiConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            anomaly: AnomalyConfig::default(),
            intervals: Intervals::default(),
            devices: default_devices(),
            ping_timeout_secs: default_ping_timeout(),
            alerts: AlertConfig::default(),
            storage: StorageConfig::default(),
            api: None,
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Thresholds {
    #[serde(default = "default_bandwidth")]
    pub bandwidth_mbps: f64,

    #[serde(default = "default_cpu_limit")]
    pub cpu: Limit,

    #[serde(default = "default_memory_limit")]
    pub memory: Limit,

    #[serde(default = "default_disk_limit")]
    pub disk: Limit,

    /// Response time above which a reachable device is reported
    #[serde(default = "default_latency")]
    pub latency_ms: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            bandwidth_mbps: default_bandwidth(),
            cpu: default_cpu_limit(),
            memory: default_memory_limit(),
            disk: default_disk_limit(),
            latency_ms: default_latency(),
        }
    }
}

/// Percentage limit with optional severity escalation bands
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct Limit {
    pub limit: f64,

    /// Severity once `limit` is exceeded
    #[serde(default)]
    pub severity: Severity,

    /// Higher bands, ordered by `above`
    #[serde(default)]
    pub escalations: Vec<Escalation>,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct Escalation {
    pub above: f64,
    pub severity: Severity,
}

impl Limit {
    pub fn new(limit: f64, severity: Severity) -> Self {
        Self {
            limit,
            severity,
            escalations: vec![],
        }
    }

    pub fn escalate(mut self, above: f64, severity: Severity) -> Self {
        self.escalations.push(Escalation { above, severity });
        self
    }

    /// Severity for `value`, or `None` while it stays within the limit
    pub fn severity_for(&self, value: f64) -> Option<Severity> {
        if value <= self.limit {
            return None;
        }

        let severity = self
            .escalations
            .iter()
            .filter(|band| value > band.above)
            .map(|band| band.severity)
            .fold(self.severity, Severity::max);

        Some(severity)
    }
}

/// Statistical spike detection over recent network throughput
#[derive(Debug, Clone, serde::Deserialize)]
pub struct AnomalyConfig {
    /// Number of prior samples forming the baseline
    #[serde(default = "default_window")]
    pub window: usize,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Below this many prior samples only the threshold check runs
    #[serde(default = "default_min_history")]
    pub min_history: usize,

    /// Throughput floor for a spike to count (0 disables)
    #[serde(default = "default_min_spike")]
    pub min_spike_mbps: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            multiplier: default_multiplier(),
            min_history: default_min_history(),
            min_spike_mbps: default_min_spike(),
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Intervals {
    #[serde(default = "default_network_interval")]
    pub network_secs: u64,

    #[serde(default = "default_system_interval")]
    pub system_secs: u64,

    #[serde(default = "default_device_interval")]
    pub device_secs: u64,
}

impl Default for Intervals {
    fn default() -> Self {
        Self {
            network_secs: default_network_interval(),
            system_secs: default_system_interval(),
            device_secs: default_device_interval(),
        }
    }
}

impl Intervals {
    pub fn for_category(&self, category: Category) -> Duration {
        let secs = match category {
            Category::Network => self.network_secs,
            Category::System => self.system_secs,
            Category::Device => self.device_secs,
        };
        Duration::from_secs(secs)
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct AlertConfig {
    #[serde(default = "default_cooldown")]
    pub cooldown_minutes: u64,

    /// Passed to every notification channel
    #[serde(default)]
    pub recipients: Vec<String>,

    /// Notification channels (log only when empty)
    #[serde(default)]
    pub channels: Vec<NotifierConfig>,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            cooldown_minutes: default_cooldown(),
            recipients: vec![],
            channels: vec![],
        }
    }
}

impl AlertConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_minutes.saturating_mul(60))
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifierConfig {
    Discord(Discord),
    Webhook(Webhook),
    Log,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Webhook {
    pub url: String,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Discord {
    pub url: String,
    pub user_id: Option<String>,
}

/// Where the bounded logs are kept
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-memory only (no persistence)
    None,

    /// One JSON-lines file per log
    #[default]
    Jsonl,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: BackendKind,

    #[serde(default = "default_data_directory")]
    pub directory: PathBuf,

    /// Retention cap per log
    #[serde(default = "default_max_records")]
    pub max_records: usize,

    /// Extra on-disk records tolerated before a log is compacted
    pub compaction_slack: Option<usize>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            directory: default_data_directory(),
            max_records: default_max_records(),
            compaction_slack: None,
        }
    }
}

impl StorageConfig {
    pub fn compaction_slack(&self) -> usize {
        self.compaction_slack
            .unwrap_or(self.max_records / 10)
            .max(1)
    }
}

/// Read API server configuration
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// Optional bearer token
    pub auth_token: Option<String>,

    #[serde(default = "default_enable_cors")]
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            auth_token: None,
            enable_cors: default_enable_cors(),
        }
    }
}

fn default_devices() -> Vec<IpAddr> {
    vec![
        IpAddr::from([8, 8, 8, 8]),
        IpAddr::from([1, 1, 1, 1]),
    ]
}

fn default_ping_timeout() -> u64 {
    5
}

fn default_bandwidth() -> f64 {
    100.0
}

fn default_cpu_limit() -> Limit {
    Limit::new(80.0, Severity::Medium).escalate(90.0, Severity::High)
}

fn default_memory_limit() -> Limit {
    Limit::new(85.0, Severity::Medium).escalate(95.0, Severity::High)
}

fn default_disk_limit() -> Limit {
    Limit::new(90.0, Severity::High).escalate(95.0, Severity::Critical)
}

fn default_latency() -> f64 {
    1000.0
}

fn default_window() -> usize {
    10
}

fn default_multiplier() -> f64 {
    3.0
}

fn default_min_history() -> usize {
    2
}

fn default_min_spike() -> f64 {
    0.0
}

fn default_network_interval() -> u64 {
    30
}

fn default_system_interval() -> u64 {
    60
}

fn default_device_interval() -> u64 {
    120
}

fn default_cooldown() -> u64 {
    15
}

fn default_data_directory() -> PathBuf {
    PathBuf::from("./data")
}

fn default_max_records() -> usize {
    10_000
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_enable_cors() -> bool {
    true
}

impl Config {
    /// Normalize and validate, rejecting anything the engine cannot run with
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        self.devices.retain(|ip| {
            let fresh = seen.insert(*ip);
            if !fresh {
                warn!("device {ip} listed more than once, monitoring it once");
            }
            fresh
        });

        self.alerts.recipients = self
            .alerts
            .recipients
            .iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let Intervals {
            network_secs,
            system_secs,
            device_secs,
        } = self.intervals;
        for (field, secs) in [
            ("intervals.network_secs", network_secs),
            ("intervals.system_secs", system_secs),
            ("intervals.device_secs", device_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::invalid(field, "interval must be positive"));
            }
        }

        if self.ping_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "ping_timeout_secs",
                "timeout must be positive",
            ));
        }

        let cooldown_minutes = self.alerts.cooldown_minutes;
        if i64::try_from(cooldown_minutes)
            .ok()
            .and_then(chrono::Duration::try_minutes)
            .is_none()
        {
            return Err(ConfigError::invalid(
                "alerts.cooldown_minutes",
                format!("{cooldown_minutes} minutes is out of range"),
            ));
        }

        if !(self.thresholds.bandwidth_mbps > 0.0) {
            return Err(ConfigError::invalid(
                "thresholds.bandwidth_mbps",
                format!("{} is not a positive rate", self.thresholds.bandwidth_mbps),
            ));
        }

        if !(self.thresholds.latency_ms > 0.0) {
            return Err(ConfigError::invalid(
                "thresholds.latency_ms",
                format!("{} is not a positive latency", self.thresholds.latency_ms),
            ));
        }

        validate_limit("thresholds.cpu", &self.thresholds.cpu)?;
        validate_limit("thresholds.memory", &self.thresholds.memory)?;
        validate_limit("thresholds.disk", &self.thresholds.disk)?;

        let anomaly = &self.anomaly;
        if anomaly.window == 0 {
            return Err(ConfigError::invalid("anomaly.window", "window must be positive"));
        }
        if anomaly.min_history == 0 || anomaly.min_history > anomaly.window {
            return Err(ConfigError::invalid(
                "anomaly.min_history",
                format!("must be between 1 and the window ({})", anomaly.window),
            ));
        }
        if !(anomaly.multiplier > 1.0) {
            return Err(ConfigError::invalid(
                "anomaly.multiplier",
                format!("{} must be greater than 1", anomaly.multiplier),
            ));
        }
        if !(anomaly.min_spike_mbps >= 0.0) {
            return Err(ConfigError::invalid(
                "anomaly.min_spike_mbps",
                "must not be negative",
            ));
        }

        if self.storage.max_records == 0 {
            return Err(ConfigError::invalid(
                "storage.max_records",
                "retention cap must be positive",
            ));
        }

        for channel in &self.alerts.channels {
            let url = match channel {
                NotifierConfig::Discord(Discord { url, .. }) => url,
                NotifierConfig::Webhook(Webhook { url }) => url,
                NotifierConfig::Log => continue,
            };
            if let Err(e) = reqwest::Url::parse(url) {
                return Err(ConfigError::invalid(
                    "alerts.channels",
                    format!("invalid url '{url}': {e}"),
                ));
            }
        }

        if self.devices.is_empty() {
            warn!("no devices configured, device cycle will produce no samples");
        }

        Ok(())
    }
}

fn validate_limit(field: &'static str, limit: &Limit) -> Result<(), ConfigError> {
    if !(limit.limit > 0.0 && limit.limit <= 100.0) {
        return Err(ConfigError::invalid(
            field,
            format!("limit {} is not a percentage in (0, 100]", limit.limit),
        ));
    }

    let mut floor = limit.limit;
    let mut severity = limit.severity;
    for band in &limit.escalations {
        if !(band.above > floor && band.above <= 100.0) {
            return Err(ConfigError::invalid(
                field,
                format!("escalation at {} must lie above {floor} and within 100", band.above),
            ));
        }
        if band.severity < severity {
            return Err(ConfigError::invalid(
                field,
                format!("escalation at {} lowers severity to {}", band.above, band.severity),
            ));
        }
        floor = band.above;
        severity = band.severity;
    }

    Ok(())
}

pub fn read_config_file(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let file_content = std::fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&file_content)?;
    config
        .validated()
        .inspect(|config| trace!("loaded config: {config:?}"))
}
