//! Metric source adapters
//!
//! Each adapter queries the operating system for one metric category and
//! turns the answer into [`Sample`]s. Adapters keep whatever state they need
//! between calls (previous counters, open system handles) and are owned by
//! exactly one collector.

pub mod device;
pub mod network;
pub mod system;

use async_trait::async_trait;

use crate::error::AdapterError;
use crate::{Category, Sample};

pub use device::DeviceSource;
pub use network::NetworkSource;
pub use system::SystemSource;

#[async_trait]
pub trait MetricSource: Send {
    fn category(&self) -> Category;

    /// Take one round of measurements
    async fn collect(&mut self) -> Result<Vec<Sample>, AdapterError>;
}
