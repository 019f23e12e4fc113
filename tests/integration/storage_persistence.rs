//! Integration tests for the JSON-lines store across restarts

use std::path::Path;

use chrono::{Duration, Utc};
use network_monitoring::Category;
use network_monitoring::actors::StorageHandle;
use network_monitoring::alerts::{AlertEvent, Severity};
use network_monitoring::config::{BackendKind, StorageConfig};
use network_monitoring::evaluation::CandidateAlert;
use network_monitoring::storage::{
    AlertFilter, ExportScope, JsonLinesBackend, LogKind, MetricStore, Snapshot, StorageBackend,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use crate::helpers::*;

fn storage_config(dir: &Path, max_records: usize) -> StorageConfig {
    StorageConfig {
        backend: BackendKind::Jsonl,
        directory: dir.to_path_buf(),
        max_records,
        compaction_slack: Some(2),
    }
}

fn alert(metric: &str, severity: Severity) -> AlertEvent {
    AlertEvent::raise(
        CandidateAlert {
            category: Category::System,
            metric_name: metric.to_string(),
            device_ip: None,
            severity,
            message: format!("{metric} over limit"),
            value: 97.0,
            threshold: 90.0,
        },
        Utc::now(),
    )
}

fn line_count(path: &Path) -> usize {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .filter(|line| !line.trim().is_empty())
        .count()
}

#[tokio::test]
async fn test_records_survive_restart() {
    let dir = TempDir::new().unwrap();
    let config = storage_config(dir.path(), 100);

    let storage = StorageHandle::open(&config).await.unwrap();
    for cpu in [10.0, 20.0, 30.0] {
        storage
            .append(system(cpu, 1.0, 1.0))
            .await
            .unwrap()
            .unwrap();
    }
    storage
        .append(device("172.16.0.9", Some(12.0)))
        .await
        .unwrap()
        .unwrap();
    storage
        .append_alert(alert("disk_percent", Severity::Critical))
        .await
        .unwrap()
        .unwrap();
    storage.shutdown().await.unwrap();

    let reopened = StorageHandle::open(&config).await.unwrap();
    let cpus: Vec<f64> = reopened
        .latest(Category::System, 10)
        .await
        .unwrap()
        .into_iter()
        .map(|sample| match sample.data {
            network_monitoring::SampleData::System(fields) => fields.cpu_percent,
            _ => panic!("unexpected category"),
        })
        .collect();
    assert_eq!(cpus, vec![10.0, 20.0, 30.0]);
    assert_eq!(reopened.latest(Category::Device, 10).await.unwrap().len(), 1);

    let alerts = reopened.query_alerts(AlertFilter::default()).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity, Severity::Critical);

    reopened.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_log_is_compacted_to_most_recent_records() {
    let dir = TempDir::new().unwrap();
    let config = storage_config(dir.path(), 5);
    let path = JsonLinesBackend::new(dir.path())
        .await
        .unwrap()
        .path_for(LogKind::Samples(Category::Network));

    let storage = StorageHandle::open(&config).await.unwrap();
    for i in 0..20 {
        storage
            .append(network(i as f64, 0.0))
            .await
            .unwrap()
            .unwrap();
        assert!(line_count(&path) <= 5 + 2);
    }
    let stats = storage.get_stats().await.unwrap();
    assert!(stats.compactions >= 1);
    storage.shutdown().await.unwrap();

    let reopened = StorageHandle::open(&config).await.unwrap();
    let uploads: Vec<f64> = reopened
        .latest(Category::Network, 100)
        .await
        .unwrap()
        .into_iter()
        .map(|sample| match sample.data {
            network_monitoring::SampleData::Network(fields) => fields.upload_mbps,
            _ => panic!("unexpected category"),
        })
        .collect();
    assert_eq!(uploads, vec![15.0, 16.0, 17.0, 18.0, 19.0]);

    reopened.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_resolution_is_persisted() {
    let dir = TempDir::new().unwrap();
    let config = storage_config(dir.path(), 100);

    let storage = StorageHandle::open(&config).await.unwrap();
    let raised = alert("memory_percent", Severity::High);
    let id = raised.id;
    storage.append_alert(raised).await.unwrap().unwrap();
    storage
        .append_alert(alert("cpu_percent", Severity::Medium))
        .await
        .unwrap()
        .unwrap();

    assert!(storage.resolve_alert(id).await.unwrap());
    assert!(!storage.resolve_alert(uuid::Uuid::new_v4()).await.unwrap());
    storage.shutdown().await.unwrap();

    let reopened = StorageHandle::open(&config).await.unwrap();
    let summary = reopened.alert_summary().await.unwrap();
    assert_eq!(summary.total, 2);
    assert_eq!(summary.unresolved, 1);

    let alerts = reopened.query_alerts(AlertFilter::default()).await.unwrap();
    let resolved = alerts.iter().find(|alert| alert.id == id).unwrap();
    assert!(resolved.resolved);

    reopened.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_malformed_lines_are_skipped_on_load() {
    let dir = TempDir::new().unwrap();
    let backend = JsonLinesBackend::new(dir.path()).await.unwrap();
    backend.append_sample(&system(50.0, 1.0, 1.0)).await.unwrap();
    let path = backend.path_for(LogKind::Samples(Category::System));

    let mut content = std::fs::read_to_string(&path).unwrap();
    content.push_str("{not json\n");
    std::fs::write(&path, content).unwrap();
    backend.append_sample(&system(60.0, 1.0, 1.0)).await.unwrap();

    let storage = StorageHandle::open(&storage_config(dir.path(), 100))
        .await
        .unwrap();
    assert_eq!(storage.latest(Category::System, 10).await.unwrap().len(), 2);

    storage.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_export_snapshot_round_trip() {
    let dir = TempDir::new().unwrap();
    let config = storage_config(dir.path(), 100);

    let storage = StorageHandle::open(&config).await.unwrap();
    storage.append(network(3.0, 4.0)).await.unwrap().unwrap();
    storage
        .append(system(12.0, 34.0, 56.0))
        .await
        .unwrap()
        .unwrap();
    storage
        .append_alert(alert("cpu_percent", Severity::High))
        .await
        .unwrap()
        .unwrap();
    storage.shutdown().await.unwrap();

    let backend = JsonLinesBackend::new(dir.path()).await.unwrap();
    let (store, on_disk) = MetricStore::load(&backend, 100).await.unwrap();
    assert_eq!(on_disk[&LogKind::Samples(Category::Network)], 1);

    let until = Utc::now();
    let snapshot = store.snapshot(
        ExportScope::Category(Category::System),
        until - Duration::hours(1),
        until,
    );
    assert_eq!(snapshot.record_count(), 1);
    assert!(snapshot.network.is_empty());
    assert!(snapshot.alerts.is_empty());

    let out = dir.path().join("export.json");
    snapshot.write_to(&out).await.unwrap();
    let loaded = Snapshot::load(&out).await.unwrap();
    assert_eq!(loaded.scope, ExportScope::Category(Category::System));
    assert_eq!(loaded.system, snapshot.system);
}
