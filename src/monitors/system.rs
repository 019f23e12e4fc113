use std::path::Path;

use async_trait::async_trait;
use sysinfo::{Disks, System};
use tracing::{instrument, trace};

use super::MetricSource;
use crate::error::AdapterError;
use crate::{Category, Sample, SystemFields};

/// CPU, memory and root-disk utilisation
///
/// The `System` handle is kept between calls so CPU usage is measured over
/// the collection interval instead of a fixed sleep.
pub struct SystemSource {
    system: System,
    disks: Disks,
}

impl SystemSource {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        system.refresh_memory();

        Self {
            system,
            disks: Disks::new_with_refreshed_list(),
        }
    }

    fn memory_percent(&self) -> Result<f64, AdapterError> {
        let total = self.system.total_memory();
        if total == 0 {
            return Err(unavailable("total memory reported as zero"));
        }
        Ok(percent(self.system.used_memory(), total))
    }

    fn disk_percent(&self) -> Result<f64, AdapterError> {
        let root = self
            .disks
            .iter()
            .find(|disk| disk.mount_point() == Path::new("/"));

        let (total, available) = match root {
            Some(disk) => (disk.total_space(), disk.available_space()),
            None => self
                .disks
                .iter()
                .filter(|disk| disk.total_space() > 0)
                .fold((0, 0), |(total, available), disk| {
                    (total + disk.total_space(), available + disk.available_space())
                }),
        };

        if total == 0 {
            return Err(unavailable("no disks with capacity found"));
        }
        Ok(percent(total.saturating_sub(available), total))
    }
}

impl Default for SystemSource {
    fn default() -> Self {
        Self::new()
    }
}

fn percent(used: u64, total: u64) -> f64 {
    used as f64 / total as f64 * 100.0
}

fn unavailable(reason: &str) -> AdapterError {
    AdapterError::Unavailable {
        category: Category::System,
        reason: reason.to_string(),
    }
}

#[async_trait]
impl MetricSource for SystemSource {
    fn category(&self) -> Category {
        Category::System
    }

    #[instrument(skip(self))]
    async fn collect(&mut self) -> Result<Vec<Sample>, AdapterError> {
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();
        self.disks.refresh(true);

        let fields = SystemFields {
            cpu_percent: self.system.global_cpu_usage() as f64,
            memory_percent: self.memory_percent()?,
            disk_percent: self.disk_percent()?,
        };

        trace!(
            "system: cpu {:.1}%, memory {:.1}%, disk {:.1}%",
            fields.cpu_percent, fields.memory_percent, fields.disk_percent
        );

        Ok(vec![Sample::system(fields)])
    }
}
