use std::time::Instant;

use async_trait::async_trait;
use sysinfo::Networks;
use tracing::{instrument, trace};

use super::MetricSource;
use crate::error::AdapterError;
use crate::{Category, NetworkFields, Sample};

const BITS_PER_BYTE: f64 = 8.0;
const BYTES_PER_MEGABIT: f64 = 1024.0 * 1024.0;

/// Cumulative interface counters at one point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
}

/// Upload and download rate in Mbps between two counter readings.
/// Counters that went backwards (interface reset) count as zero traffic.
pub fn rates(previous: Counters, current: Counters, elapsed_secs: f64) -> (f64, f64) {
    if elapsed_secs <= 0.0 {
        return (0.0, 0.0);
    }

    let to_mbps = |delta: u64| delta as f64 * BITS_PER_BYTE / BYTES_PER_MEGABIT / elapsed_secs;

    (
        to_mbps(current.bytes_sent.saturating_sub(previous.bytes_sent)),
        to_mbps(current.bytes_recv.saturating_sub(previous.bytes_recv)),
    )
}

/// Aggregate network throughput over all non-loopback interfaces
pub struct NetworkSource {
    networks: Networks,
    previous: Option<(Counters, Instant)>,
}

impl NetworkSource {
    pub fn new() -> Self {
        Self {
            networks: Networks::new_with_refreshed_list(),
            previous: None,
        }
    }

    fn read_counters(&mut self) -> Result<Counters, AdapterError> {
        self.networks.refresh(true);

        let mut interfaces = 0;
        let counters = self
            .networks
            .iter()
            .filter(|(name, _)| !name.starts_with("lo"))
            .fold(Counters::default(), |acc, (_, data)| {
                interfaces += 1;
                Counters {
                    bytes_sent: acc.bytes_sent + data.total_transmitted(),
                    bytes_recv: acc.bytes_recv + data.total_received(),
                    packets_sent: acc.packets_sent + data.total_packets_transmitted(),
                    packets_recv: acc.packets_recv + data.total_packets_received(),
                }
            });

        if interfaces == 0 {
            return Err(AdapterError::Unavailable {
                category: Category::Network,
                reason: "no network interfaces found".to_string(),
            });
        }

        Ok(counters)
    }
}

impl Default for NetworkSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricSource for NetworkSource {
    fn category(&self) -> Category {
        Category::Network
    }

    #[instrument(skip(self))]
    async fn collect(&mut self) -> Result<Vec<Sample>, AdapterError> {
        let current = self.read_counters()?;
        let now = Instant::now();

        // the first reading only establishes the baseline counters
        let (upload_mbps, download_mbps) = match self.previous {
            Some((previous, at)) => rates(previous, current, now.duration_since(at).as_secs_f64()),
            None => (0.0, 0.0),
        };
        self.previous = Some((current, now));

        trace!("network: up {upload_mbps:.3} Mbps, down {download_mbps:.3} Mbps");

        Ok(vec![Sample::network(NetworkFields {
            upload_mbps,
            download_mbps,
            bytes_sent: current.bytes_sent,
            bytes_recv: current.bytes_recv,
            packets_sent: current.packets_sent,
            packets_recv: current.packets_recv,
        })])
    }
}
