//! Threshold and anomaly evaluation
//!
//! Evaluation is a pure function of a new sample and the samples recorded
//! before it. It holds no state of its own, so repeated calls with the same
//! input always produce the same candidates.

use std::net::IpAddr;

use tracing::trace;

use crate::alerts::{AlertKey, Severity};
use crate::config::{AnomalyConfig, Config, Limit, Thresholds};
use crate::{Category, DeviceFields, NetworkFields, Sample, SampleData, SystemFields};

/// An alert proposed by the evaluator, before cooldown filtering
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateAlert {
    pub category: Category,
    pub metric_name: String,
    pub device_ip: Option<IpAddr>,
    pub severity: Severity,
    pub message: String,
    pub value: f64,
    pub threshold: f64,
}

impl CandidateAlert {
    pub fn key(&self) -> AlertKey {
        match self.device_ip {
            Some(ip) => AlertKey::Device { ip },
            None => AlertKey::Metric {
                category: self.category,
                metric: self.metric_name.clone(),
            },
        }
    }
}

/// Trailing mean of recent network throughput
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Baseline {
    pub mean_mbps: f64,
    pub samples: usize,
}

impl Baseline {
    /// Mean total throughput of the last `window` network samples in `history`
    pub fn from_history(history: &[Sample], window: usize) -> Option<Baseline> {
        let totals = history
            .iter()
            .rev()
            .filter_map(|sample| match &sample.data {
                SampleData::Network(fields) => Some(fields.total_mbps()),
                _ => None,
            })
            .take(window)
            .collect::<Vec<_>>();

        if totals.is_empty() {
            return None;
        }

        Some(Baseline {
            mean_mbps: totals.iter().sum::<f64>() / totals.len() as f64,
            samples: totals.len(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Evaluator {
    thresholds: Thresholds,
    anomaly: AnomalyConfig,
}

impl Evaluator {
    pub fn new(thresholds: Thresholds, anomaly: AnomalyConfig) -> Self {
        Self { thresholds, anomaly }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.thresholds.clone(), config.anomaly.clone())
    }

    /// How many prior samples of `category` evaluation looks at
    pub fn history_len(&self, category: Category) -> usize {
        match category {
            Category::Network => self.anomaly.window,
            Category::System | Category::Device => 0,
        }
    }

    pub fn evaluate(&self, sample: &Sample, history: &[Sample]) -> Vec<CandidateAlert> {
        let candidates = match &sample.data {
            SampleData::Network(fields) => self.evaluate_network(fields, history),
            SampleData::System(fields) => self.evaluate_system(fields),
            SampleData::Device(fields) => self.evaluate_device(fields),
        };

        trace!(
            "{} sample at {} -> {} candidate(s)",
            sample.category(),
            sample.timestamp,
            candidates.len()
        );

        candidates
    }

    fn evaluate_network(&self, fields: &NetworkFields, history: &[Sample]) -> Vec<CandidateAlert> {
        let limit = self.thresholds.bandwidth_mbps;
        let mut candidates = vec![];

        for (metric, direction, value) in [
            ("upload_mbps", "upload", fields.upload_mbps),
            ("download_mbps", "download", fields.download_mbps),
        ] {
            if value > limit {
                candidates.push(CandidateAlert {
                    category: Category::Network,
                    metric_name: metric.to_string(),
                    device_ip: None,
                    severity: Severity::High,
                    message: format!("High {direction} usage: {value:.2} Mbps"),
                    value,
                    threshold: limit,
                });
            }
        }

        if let Some(spike) = self.detect_spike(fields.total_mbps(), history) {
            candidates.push(spike);
        }

        candidates
    }

    fn detect_spike(&self, total: f64, history: &[Sample]) -> Option<CandidateAlert> {
        let AnomalyConfig {
            window,
            multiplier,
            min_history,
            min_spike_mbps,
        } = self.anomaly;

        let baseline = Baseline::from_history(history, window)?;
        if baseline.samples < min_history || baseline.mean_mbps <= 0.0 {
            return None;
        }

        let threshold = baseline.mean_mbps * multiplier;
        if total <= threshold || total < min_spike_mbps {
            return None;
        }

        Some(CandidateAlert {
            category: Category::Network,
            metric_name: "bandwidth_spike".to_string(),
            device_ip: None,
            severity: Severity::Medium,
            message: format!(
                "Unusual bandwidth spike: {total:.2} Mbps (average {:.2} Mbps)",
                baseline.mean_mbps
            ),
            value: total,
            threshold,
        })
    }

    fn evaluate_system(&self, fields: &SystemFields) -> Vec<CandidateAlert> {
        [
            ("cpu_percent", "CPU usage", fields.cpu_percent, &self.thresholds.cpu),
            (
                "memory_percent",
                "memory usage",
                fields.memory_percent,
                &self.thresholds.memory,
            ),
            ("disk_percent", "disk usage", fields.disk_percent, &self.thresholds.disk),
        ]
        .into_iter()
        .filter_map(|(metric, label, value, limit)| system_candidate(metric, label, value, limit))
        .collect()
    }

    fn evaluate_device(&self, fields: &DeviceFields) -> Vec<CandidateAlert> {
        let DeviceFields {
            ip,
            is_reachable,
            response_time_ms,
        } = *fields;

        if !is_reachable {
            return vec![CandidateAlert {
                category: Category::Device,
                metric_name: "unreachable".to_string(),
                device_ip: Some(ip),
                severity: Severity::High,
                message: format!("Device {ip} is unreachable"),
                value: 0.0,
                threshold: 0.0,
            }];
        }

        let ceiling = self.thresholds.latency_ms;
        match response_time_ms {
            Some(latency) if latency > ceiling => vec![CandidateAlert {
                category: Category::Device,
                metric_name: "latency".to_string(),
                device_ip: Some(ip),
                severity: Severity::Medium,
                message: format!("High latency to {ip}: {latency:.1} ms"),
                value: latency,
                threshold: ceiling,
            }],
            _ => vec![],
        }
    }
}

fn system_candidate(
    metric: &str,
    label: &str,
    value: f64,
    limit: &Limit,
) -> Option<CandidateAlert> {
    let severity = limit.severity_for(value)?;
    Some(CandidateAlert {
        category: Category::System,
        metric_name: metric.to_string(),
        device_ip: None,
        severity,
        message: format!("High {label}: {value:.1}%"),
        value,
        threshold: limit.limit,
    })
}
