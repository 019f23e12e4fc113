//! Helper sources, notifiers and configs for integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use network_monitoring::alerts::AlertEvent;
use network_monitoring::config::Config;
use network_monitoring::error::{AdapterError, NotificationError};
use network_monitoring::monitors::MetricSource;
use network_monitoring::notify::Notifier;
use network_monitoring::{Category, DeviceFields, NetworkFields, Sample, SystemFields};

/// Interval long enough that only the immediate first tick fires on its own
pub const IDLE_INTERVAL: Duration = Duration::from_secs(3600);

/// Default config with every collector on the idle interval
pub fn idle_config() -> Config {
    let mut config = Config::default();
    config.intervals.network_secs = IDLE_INTERVAL.as_secs();
    config.intervals.system_secs = IDLE_INTERVAL.as_secs();
    config.intervals.device_secs = IDLE_INTERVAL.as_secs();
    config
}

/// Wait for the immediate first tick of freshly spawned collectors
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

pub fn network(upload_mbps: f64, download_mbps: f64) -> Sample {
    Sample::network(NetworkFields {
        upload_mbps,
        download_mbps,
        ..Default::default()
    })
}

pub fn system(cpu_percent: f64, memory_percent: f64, disk_percent: f64) -> Sample {
    Sample::system(SystemFields {
        cpu_percent,
        memory_percent,
        disk_percent,
    })
}

pub fn device(ip: &str, response_time_ms: Option<f64>) -> Sample {
    Sample::device(DeviceFields {
        ip: ip.parse::<IpAddr>().unwrap(),
        is_reachable: response_time_ms.is_some(),
        response_time_ms,
    })
}

/// Emits the same samples on every cycle, freshly timestamped
pub struct StaticSource {
    category: Category,
    samples: Vec<Sample>,
    pub calls: Arc<AtomicUsize>,
}

impl StaticSource {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self {
            category: samples[0].category(),
            samples,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl MetricSource for StaticSource {
    fn category(&self) -> Category {
        self.category
    }

    async fn collect(&mut self) -> Result<Vec<Sample>, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .samples
            .iter()
            .cloned()
            .map(|mut sample| {
                sample.timestamp = Utc::now();
                sample
            })
            .collect())
    }
}

/// Emits one queued batch per cycle, nothing once the queue is drained
pub struct QueueSource {
    category: Category,
    batches: VecDeque<Vec<Sample>>,
}

impl QueueSource {
    pub fn new(category: Category, batches: Vec<Vec<Sample>>) -> Self {
        Self {
            category,
            batches: batches.into(),
        }
    }
}

#[async_trait]
impl MetricSource for QueueSource {
    fn category(&self) -> Category {
        self.category
    }

    async fn collect(&mut self) -> Result<Vec<Sample>, AdapterError> {
        Ok(self.batches.pop_front().unwrap_or_default())
    }
}

/// Always fails, like a device adapter whose ping binary is missing
pub struct FailingSource(pub Category);

#[async_trait]
impl MetricSource for FailingSource {
    fn category(&self) -> Category {
        self.0
    }

    async fn collect(&mut self) -> Result<Vec<Sample>, AdapterError> {
        Err(AdapterError::Unavailable {
            category: self.0,
            reason: "simulated outage".to_string(),
        })
    }
}

/// Takes `delay` to produce a single sample
pub struct SlowSource {
    pub delay: Duration,
}

#[async_trait]
impl MetricSource for SlowSource {
    fn category(&self) -> Category {
        Category::System
    }

    async fn collect(&mut self) -> Result<Vec<Sample>, AdapterError> {
        tokio::time::sleep(self.delay).await;
        Ok(vec![system(1.0, 1.0, 1.0)])
    }
}

/// Records every alert it is told about
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    pub sent: Arc<Mutex<Vec<AlertEvent>>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<AlertEvent> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn notify(
        &self,
        alert: &AlertEvent,
        _recipients: &[String],
    ) -> Result<(), NotificationError> {
        self.sent.lock().unwrap().push(alert.clone());
        if self.fail {
            return Err(NotificationError::Rejected(
                reqwest::StatusCode::SERVICE_UNAVAILABLE,
            ));
        }
        Ok(())
    }
}
