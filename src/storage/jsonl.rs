//! JSON-lines storage backend
//!
//! Every log is a file in the data directory holding one JSON object per
//! line (`network.jsonl`, `system.jsonl`, `device.jsonl`, `alerts.jsonl`).
//! Appends add a line at the end. Compaction replaces a file with the
//! retained records by writing a temporary file and renaming it over the
//! original, so a crash leaves either the old or the new file intact.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use super::backend::{HealthStatus, LogKind, StorageBackend};
use super::error::{StorageError, StorageResult};
use crate::alerts::AlertEvent;
use crate::{Category, Sample};

pub struct JsonLinesBackend {
    directory: PathBuf,
}

impl JsonLinesBackend {
    /// Open (and create if needed) a data directory
    #[instrument(skip_all)]
    pub async fn new(directory: impl AsRef<Path>) -> StorageResult<Self> {
        let directory = directory.as_ref().to_path_buf();
        info!("initializing JSON-lines backend at: {}", directory.display());

        fs::create_dir_all(&directory)
            .await
            .map_err(|e| StorageError::io(&directory, e))?;

        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn path_for(&self, kind: LogKind) -> PathBuf {
        self.directory.join(kind.file_name())
    }

    async fn append_record<T: Serialize + Sync>(&self, kind: LogKind, record: &T) -> StorageResult<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let path = self.path_for(kind);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| StorageError::io(&path, e))?;

        file.write_all(&line)
            .await
            .map_err(|e| StorageError::io(&path, e))?;

        Ok(())
    }

    async fn load_records<T: DeserializeOwned>(&self, kind: LogKind) -> StorageResult<Vec<T>> {
        let path = self.path_for(kind);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no {kind} log at {}, starting empty", path.display());
                return Ok(vec![]);
            }
            Err(e) => return Err(StorageError::io(&path, e)),
        };

        let (records, skipped) = parse_lines(&content);
        if skipped > 0 {
            warn!(
                "skipped {skipped} malformed line(s) in {}",
                path.display()
            );
        }

        debug!("loaded {} {kind} record(s)", records.len());
        Ok(records)
    }

    async fn rewrite_records<T: Serialize + Sync>(
        &self,
        kind: LogKind,
        records: &[T],
    ) -> StorageResult<()> {
        let mut buffer = Vec::with_capacity(records.len() * 128);
        for record in records {
            serde_json::to_writer(&mut buffer, record)?;
            buffer.push(b'\n');
        }

        let path = self.path_for(kind);
        let tmp_path = path.with_extension("jsonl.tmp");

        let mut file = fs::File::create(&tmp_path)
            .await
            .map_err(|e| StorageError::io(&tmp_path, e))?;
        file.write_all(&buffer)
            .await
            .map_err(|e| StorageError::io(&tmp_path, e))?;
        file.sync_all()
            .await
            .map_err(|e| StorageError::io(&tmp_path, e))?;
        drop(file);

        fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| StorageError::io(&path, e))?;

        debug!("rewrote {} with {} record(s)", path.display(), records.len());
        Ok(())
    }
}

/// Decode one record per non-empty line, counting lines that fail to parse
fn parse_lines<T: DeserializeOwned>(content: &str) -> (Vec<T>, usize) {
    let mut skipped = 0;
    let records = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str(line) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!("malformed record: {e}");
                skipped += 1;
                None
            }
        })
        .collect();
    (records, skipped)
}

#[async_trait]
impl StorageBackend for JsonLinesBackend {
    fn name(&self) -> &'static str {
        "jsonl"
    }

    async fn load_samples(&self, category: Category) -> StorageResult<Vec<Sample>> {
        let samples: Vec<Sample> = self.load_records(LogKind::Samples(category)).await?;

        // a file edited by hand may hold records of another category
        Ok(samples
            .into_iter()
            .filter(|sample| sample.category() == category)
            .collect())
    }

    async fn load_alerts(&self) -> StorageResult<Vec<AlertEvent>> {
        self.load_records(LogKind::Alerts).await
    }

    async fn append_sample(&self, sample: &Sample) -> StorageResult<()> {
        self.append_record(LogKind::Samples(sample.category()), sample)
            .await
    }

    async fn append_alert(&self, alert: &AlertEvent) -> StorageResult<()> {
        self.append_record(LogKind::Alerts, alert).await
    }

    #[instrument(skip(self, samples), fields(count = samples.len()))]
    async fn rewrite_samples(&self, category: Category, samples: &[Sample]) -> StorageResult<()> {
        self.rewrite_records(LogKind::Samples(category), samples)
            .await
    }

    #[instrument(skip(self, alerts), fields(count = alerts.len()))]
    async fn rewrite_alerts(&self, alerts: &[AlertEvent]) -> StorageResult<()> {
        self.rewrite_records(LogKind::Alerts, alerts).await
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let mut metadata = HashMap::new();
        metadata.insert("backend".to_string(), "jsonl".to_string());
        metadata.insert(
            "directory".to_string(),
            self.directory.display().to_string(),
        );

        match fs::metadata(&self.directory).await {
            Ok(meta) if meta.is_dir() && !meta.permissions().readonly() => Ok(HealthStatus {
                healthy: true,
                message: "JSON-lines backend operational".to_string(),
                metadata,
            }),
            Ok(_) => Ok(HealthStatus {
                healthy: false,
                message: "data directory is not a writable directory".to_string(),
                metadata,
            }),
            Err(e) => {
                warn!("health check failed: {e}");
                Ok(HealthStatus {
                    healthy: false,
                    message: format!("health check failed: {e}"),
                    metadata,
                })
            }
        }
    }

    async fn close(&self) -> StorageResult<()> {
        debug!("closing JSON-lines backend at {}", self.directory.display());
        Ok(())
    }
}
