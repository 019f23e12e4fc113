//! Point-in-time JSON snapshots of the stored logs

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::backend::LogKind;
use super::error::{StorageError, StorageResult};
use crate::alerts::AlertEvent;
use crate::{Category, Sample};

/// Which logs an export covers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ExportScope {
    #[default]
    All,
    Category(Category),
    Alerts,
}

impl ExportScope {
    pub fn includes(&self, kind: LogKind) -> bool {
        match (self, kind) {
            (ExportScope::All, _) => true,
            (ExportScope::Category(scope), LogKind::Samples(category)) => *scope == category,
            (ExportScope::Alerts, LogKind::Alerts) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ExportScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportScope::All => f.write_str("all"),
            ExportScope::Category(category) => write!(f, "{category}"),
            ExportScope::Alerts => f.write_str("alerts"),
        }
    }
}

impl FromStr for ExportScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(ExportScope::All),
            "alerts" => Ok(ExportScope::Alerts),
            other => other
                .parse::<Category>()
                .map(ExportScope::Category)
                .map_err(|_| format!("unknown export scope '{other}'")),
        }
    }
}

impl TryFrom<String> for ExportScope {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ExportScope> for String {
    fn from(scope: ExportScope) -> Self {
        scope.to_string()
    }
}

/// Exported records, readable without a running engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub exported_at: DateTime<Utc>,
    pub scope: ExportScope,
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,

    #[serde(default)]
    pub network: Vec<Sample>,
    #[serde(default)]
    pub system: Vec<Sample>,
    #[serde(default)]
    pub device: Vec<Sample>,
    #[serde(default)]
    pub alerts: Vec<AlertEvent>,
}

impl Snapshot {
    pub fn empty(scope: ExportScope, since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self {
            exported_at: Utc::now(),
            scope,
            since,
            until,
            network: vec![],
            system: vec![],
            device: vec![],
            alerts: vec![],
        }
    }

    pub fn samples(&self, category: Category) -> &[Sample] {
        match category {
            Category::Network => &self.network,
            Category::System => &self.system,
            Category::Device => &self.device,
        }
    }

    pub fn samples_mut(&mut self, category: Category) -> &mut Vec<Sample> {
        match category {
            Category::Network => &mut self.network,
            Category::System => &mut self.system,
            Category::Device => &mut self.device,
        }
    }

    pub fn record_count(&self) -> usize {
        self.network.len() + self.system.len() + self.device.len() + self.alerts.len()
    }

    pub async fn write_to(&self, path: impl AsRef<Path>) -> StorageResult<()> {
        let path = path.as_ref();
        let json = serde_json::to_vec_pretty(self)?;

        tokio::fs::write(path, json)
            .await
            .map_err(|e| StorageError::io(path, e))?;

        info!(
            "exported {} record(s) ({}) to {}",
            self.record_count(),
            self.scope,
            path.display()
        );
        Ok(())
    }

    pub async fn load(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read(path)
            .await
            .map_err(|e| StorageError::io(path, e))?;
        Ok(serde_json::from_slice(&content)?)
    }
}
