//! Integration tests for failure isolation
//!
//! A failing adapter, a slow adapter or a broken notification channel must
//! never stop the other collectors or lose an alert.

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use network_monitoring::Category;
use network_monitoring::actors::{AlertHandle, CollectorHandle, StorageHandle};
use network_monitoring::alerts::{AlertManager, CooldownState};
use network_monitoring::engine::Engine;
use network_monitoring::error::AdapterError;
use network_monitoring::evaluation::Evaluator;
use network_monitoring::notify::LogNotifier;
use network_monitoring::storage::AlertFilter;

use crate::helpers::*;

#[tokio::test]
async fn test_failing_device_adapter_does_not_block_network() {
    let storage = StorageHandle::in_memory(100);
    let engine = Engine::with_sources(
        &idle_config(),
        storage.clone(),
        Box::new(RecordingNotifier::default()),
        vec![
            Box::new(StaticSource::new(vec![network(1.0, 1.0)])),
            Box::new(FailingSource(Category::Device)),
        ],
    );
    settle().await;

    let device = engine.collector(Category::Device).unwrap();
    let err = device.poll_now().await.unwrap_err();
    assert_matches!(
        err.downcast_ref::<AdapterError>(),
        Some(AdapterError::Unavailable {
            category: Category::Device,
            ..
        })
    );

    let report = engine
        .collector(Category::Network)
        .unwrap()
        .poll_now()
        .await
        .unwrap();
    assert_eq!(report.samples, 1);

    let stats = storage.get_stats().await.unwrap();
    assert_eq!(stats.records["network"], 2);
    assert_eq!(stats.records["device"], 0);

    // the failing collector keeps running
    assert!(device.poll_now().await.is_err());

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_notification_failure_keeps_alert() {
    let notifier = RecordingNotifier::failing();
    let storage = StorageHandle::in_memory(100);
    let engine = Engine::with_sources(
        &idle_config(),
        storage.clone(),
        Box::new(notifier.clone()),
        vec![Box::new(StaticSource::new(vec![device("10.1.1.1", None)]))],
    );
    settle().await;

    let alerts = storage.query_alerts(AlertFilter::default()).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].metric_name, "unreachable");
    assert_eq!(notifier.sent().len(), 1);

    let stats = engine.alerts().get_stats().await.unwrap();
    assert_eq!(stats.raised, 1);
    assert_eq!(stats.notification_failures, 1);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_slow_adapter_times_out_after_one_interval() {
    let storage = StorageHandle::in_memory(100);
    let alerts = AlertHandle::spawn(
        AlertManager::new(CooldownState::new(Duration::from_secs(15 * 60))),
        Box::new(LogNotifier),
        vec![],
        storage.clone(),
    );
    let collector = CollectorHandle::spawn(
        Box::new(SlowSource {
            delay: Duration::from_secs(5),
        }),
        Arc::new(Evaluator::from_config(&idle_config())),
        storage.clone(),
        alerts.clone(),
        Duration::from_millis(100),
    );

    let err = collector.poll_now().await.unwrap_err();
    assert_matches!(
        err.downcast_ref::<AdapterError>(),
        Some(AdapterError::Timeout {
            category: Category::System,
            millis: 100,
        })
    );

    let stats = storage.get_stats().await.unwrap();
    assert_eq!(stats.records["system"], 0);

    collector.shutdown().await.unwrap();
    alerts.shutdown().await.unwrap();
    storage.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_with_stuck_collector_respects_grace() {
    let storage = StorageHandle::in_memory(100);
    let mut config = idle_config();
    config.intervals.system_secs = 60;
    let engine = Engine::with_sources(
        &config,
        storage.clone(),
        Box::new(LogNotifier),
        vec![Box::new(SlowSource {
            delay: Duration::from_secs(30),
        })],
    )
    .with_shutdown_grace(Duration::from_millis(200));

    // the immediate first tick is now stuck inside collect()
    settle().await;

    let started = tokio::time::Instant::now();
    engine.shutdown().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(storage.get_stats().await.is_err());
}
