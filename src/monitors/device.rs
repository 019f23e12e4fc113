use std::net::IpAddr;
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use regex::Regex;
use tokio::process::Command;
use tracing::{debug, instrument, trace, warn};

use super::MetricSource;
use crate::error::AdapterError;
use crate::{Category, DeviceFields, Sample};

/// Extra time granted to the ping process on top of its own timeout
const PROCESS_GRACE: Duration = Duration::from_secs(1);

static RESPONSE_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"time[=<]\s*([0-9]+(?:\.[0-9]+)?)\s*ms").expect("response time pattern is valid")
});

/// Round-trip time reported by `ping`, if any
pub fn parse_response_time(output: &str) -> Option<f64> {
    RESPONSE_TIME
        .captures(output)
        .and_then(|captures| captures.get(1))
        .and_then(|time| time.as_str().parse().ok())
}

/// Arguments for a single echo request bounded by `timeout`
pub fn ping_args(ip: IpAddr, timeout: Duration) -> Vec<String> {
    if cfg!(windows) {
        vec![
            "-n".to_string(),
            "1".to_string(),
            "-w".to_string(),
            timeout.as_millis().to_string(),
            ip.to_string(),
        ]
    } else {
        vec![
            "-c".to_string(),
            "1".to_string(),
            "-W".to_string(),
            timeout.as_secs().max(1).to_string(),
            ip.to_string(),
        ]
    }
}

/// Reachability and latency of the configured devices
pub struct DeviceSource {
    devices: Vec<IpAddr>,
    timeout: Duration,
}

impl DeviceSource {
    pub fn new(devices: Vec<IpAddr>, timeout: Duration) -> Self {
        Self { devices, timeout }
    }

    pub fn devices(&self) -> &[IpAddr] {
        &self.devices
    }

    #[instrument(skip(self))]
    async fn ping_device(&self, ip: IpAddr) -> Result<DeviceFields, AdapterError> {
        let started = Instant::now();
        let output = Command::new("ping")
            .args(ping_args(ip, self.timeout))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout + PROCESS_GRACE, output).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => return Err(AdapterError::Ping { ip, source }),
            Err(_) => {
                debug!("ping to {ip} timed out");
                return Ok(unreachable(ip));
            }
        };

        if !output.status.success() {
            trace!("ping to {ip} exited with {}", output.status);
            return Ok(unreachable(ip));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let response_time_ms = parse_response_time(&stdout)
            .unwrap_or_else(|| started.elapsed().as_secs_f64() * 1000.0);

        Ok(DeviceFields {
            ip,
            is_reachable: true,
            response_time_ms: Some(response_time_ms),
        })
    }
}

fn unreachable(ip: IpAddr) -> DeviceFields {
    DeviceFields {
        ip,
        is_reachable: false,
        response_time_ms: None,
    }
}

#[async_trait]
impl MetricSource for DeviceSource {
    fn category(&self) -> Category {
        Category::Device
    }

    async fn collect(&mut self) -> Result<Vec<Sample>, AdapterError> {
        let results = join_all(self.devices.iter().map(|ip| self.ping_device(*ip))).await;

        let mut samples = Vec::with_capacity(results.len());
        let mut first_error = None;
        for result in results {
            match result {
                Ok(fields) => samples.push(Sample::device(fields)),
                Err(e) => {
                    warn!("{e}");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) if samples.is_empty() => Err(e),
            _ => Ok(samples),
        }
    }
}
