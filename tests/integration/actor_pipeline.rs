//! Integration tests for the full actor pipeline
//!
//! Source → Collector → Evaluator → AlertActor → StorageActor, wired by the
//! engine the same way the binary does it.

use network_monitoring::Category;
use network_monitoring::actors::StorageHandle;
use network_monitoring::alerts::Severity;
use network_monitoring::engine::Engine;
use network_monitoring::storage::AlertFilter;
use pretty_assertions::assert_eq;

use crate::helpers::*;

#[tokio::test]
async fn test_threshold_breach_raises_one_alert_per_cooldown() {
    let notifier = RecordingNotifier::default();
    let storage = StorageHandle::in_memory(100);
    let engine = Engine::with_sources(
        &idle_config(),
        storage.clone(),
        Box::new(notifier.clone()),
        vec![Box::new(StaticSource::new(vec![system(95.0, 10.0, 10.0)]))],
    );
    settle().await;

    let report = engine
        .collector(Category::System)
        .unwrap()
        .poll_now()
        .await
        .unwrap();
    assert_eq!(report.candidates, 1);
    assert_eq!(report.raised, 0);

    let alerts = storage.query_alerts(AlertFilter::default()).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].metric_name, "cpu_percent");
    assert_eq!(alerts[0].severity, Severity::High);
    assert_eq!(alerts[0].value, 95.0);
    assert!(!alerts[0].resolved);

    assert_eq!(notifier.sent().len(), 1);
    assert_eq!(notifier.sent()[0].id, alerts[0].id);

    let samples = storage.latest(Category::System, 10).await.unwrap();
    assert_eq!(samples.len(), 2);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_bandwidth_spike_is_judged_against_stored_history() {
    let baseline = (0..5).map(|_| network(5.0, 5.0)).collect();
    let source = QueueSource::new(
        Category::Network,
        vec![baseline, vec![network(50.0, 50.0)]],
    );

    let storage = StorageHandle::in_memory(100);
    let engine = Engine::with_sources(
        &idle_config(),
        storage.clone(),
        Box::new(RecordingNotifier::default()),
        vec![Box::new(source)],
    );
    settle().await;

    let report = engine
        .collector(Category::Network)
        .unwrap()
        .poll_now()
        .await
        .unwrap();
    assert_eq!(report.samples, 1);
    assert_eq!(report.raised, 1);

    let alerts = storage.query_alerts(AlertFilter::default()).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].metric_name, "bandwidth_spike");
    assert_eq!(alerts[0].severity, Severity::Medium);
    assert_eq!(alerts[0].value, 100.0);
    assert_eq!(alerts[0].threshold, 30.0);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_device_alerts_are_keyed_per_ip() {
    let source = StaticSource::new(vec![
        device("10.0.0.1", None),
        device("10.0.0.2", None),
        device("10.0.0.3", Some(4.2)),
    ]);

    let storage = StorageHandle::in_memory(100);
    let engine = Engine::with_sources(
        &idle_config(),
        storage.clone(),
        Box::new(RecordingNotifier::default()),
        vec![Box::new(source)],
    );
    settle().await;

    let report = engine
        .collector(Category::Device)
        .unwrap()
        .poll_now()
        .await
        .unwrap();
    assert_eq!(report.samples, 3);
    assert_eq!(report.candidates, 2);
    assert_eq!(report.raised, 0);

    let mut ips: Vec<_> = storage
        .query_alerts(AlertFilter::default())
        .await
        .unwrap()
        .into_iter()
        .map(|alert| alert.device_ip.unwrap().to_string())
        .collect();
    ips.sort();
    assert_eq!(ips, vec!["10.0.0.1", "10.0.0.2"]);

    let from_one = storage
        .query_device(
            "10.0.0.3".parse().unwrap(),
            chrono::Utc::now() - chrono::Duration::minutes(1),
            chrono::Utc::now(),
        )
        .await
        .unwrap();
    assert_eq!(from_one.len(), 2);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_samples_below_thresholds_raise_nothing() {
    let notifier = RecordingNotifier::default();
    let storage = StorageHandle::in_memory(100);
    let engine = Engine::with_sources(
        &idle_config(),
        storage.clone(),
        Box::new(notifier.clone()),
        vec![
            Box::new(StaticSource::new(vec![network(1.0, 2.0)])),
            Box::new(StaticSource::new(vec![system(10.0, 20.0, 30.0)])),
            Box::new(StaticSource::new(vec![device("192.168.1.1", Some(3.0))])),
        ],
    );
    settle().await;

    for collector in engine.collectors() {
        let report = collector.poll_now().await.unwrap();
        assert_eq!(report.candidates, 0, "{}", collector.category());
    }

    let stats = storage.get_stats().await.unwrap();
    assert_eq!(stats.records["network"], 2);
    assert_eq!(stats.records["system"], 2);
    assert_eq!(stats.records["device"], 2);
    assert_eq!(stats.records["alerts"], 0);
    assert!(notifier.sent().is_empty());

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_stops_every_actor() {
    let storage = StorageHandle::in_memory(100);
    let engine = Engine::with_sources(
        &idle_config(),
        storage.clone(),
        Box::new(RecordingNotifier::default()),
        vec![Box::new(StaticSource::new(vec![system(1.0, 1.0, 1.0)]))],
    );
    let collector = engine.collector(Category::System).unwrap().clone();
    let alerts = engine.alerts().clone();

    engine.shutdown().await.unwrap();

    assert!(collector.poll_now().await.is_err());
    assert!(alerts.get_stats().await.is_err());
    assert!(storage.get_stats().await.is_err());
}
