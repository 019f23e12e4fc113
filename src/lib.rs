pub mod actors;
pub mod alerts;
pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluation;
pub mod monitors;
pub mod notify;
pub mod storage;
pub mod util;

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metric category a sample (or alert) belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Network,
    System,
    Device,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Network, Category::System, Category::Device];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Network => "network",
            Category::System => "system",
            Category::Device => "device",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "network" => Ok(Category::Network),
            "system" => Ok(Category::System),
            "device" => Ok(Category::Device),
            other => Err(format!("unknown metric category '{other}'")),
        }
    }
}

/// One timestamped measurement
///
/// Serialized flat, e.g.
/// `{"timestamp":"...","category":"system","cpu_percent":12.5,...}`,
/// which is also the on-disk record format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,

    #[serde(flatten)]
    pub data: SampleData,
}

/// Category-specific payload of a sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "lowercase")]
pub enum SampleData {
    Network(NetworkFields),
    System(SystemFields),
    Device(DeviceFields),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkFields {
    pub upload_mbps: f64,
    pub download_mbps: f64,
    #[serde(default)]
    pub bytes_sent: u64,
    #[serde(default)]
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
}

impl NetworkFields {
    /// Combined upload and download throughput
    pub fn total_mbps(&self) -> f64 {
        self.upload_mbps + self.download_mbps
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemFields {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceFields {
    pub ip: IpAddr,
    pub is_reachable: bool,
    pub response_time_ms: Option<f64>,
}

impl Sample {
    pub fn new(timestamp: DateTime<Utc>, data: SampleData) -> Self {
        Self { timestamp, data }
    }

    pub fn network(fields: NetworkFields) -> Self {
        Self::new(Utc::now(), SampleData::Network(fields))
    }

    pub fn system(fields: SystemFields) -> Self {
        Self::new(Utc::now(), SampleData::System(fields))
    }

    pub fn device(fields: DeviceFields) -> Self {
        Self::new(Utc::now(), SampleData::Device(fields))
    }

    pub fn category(&self) -> Category {
        match self.data {
            SampleData::Network(_) => Category::Network,
            SampleData::System(_) => Category::System,
            SampleData::Device(_) => Category::Device,
        }
    }

    /// Device IP for device samples
    pub fn device_ip(&self) -> Option<IpAddr> {
        match &self.data {
            SampleData::Device(fields) => Some(fields.ip),
            _ => None,
        }
    }
}
