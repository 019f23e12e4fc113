//! Concurrency tests
//!
//! Many tasks talk to the same actors at once; every request must be
//! answered and the store must stay ordered and bounded.

use std::time::Duration;

use futures::future::join_all;
use network_monitoring::Category;
use network_monitoring::actors::{AlertHandle, StorageHandle};
use network_monitoring::alerts::{AlertManager, CooldownState, Severity};
use network_monitoring::engine::Engine;
use network_monitoring::evaluation::CandidateAlert;
use network_monitoring::notify::LogNotifier;
use network_monitoring::storage::AlertFilter;

use crate::helpers::*;

fn candidate(metric: &str) -> CandidateAlert {
    CandidateAlert {
        category: Category::System,
        metric_name: metric.to_string(),
        device_ip: None,
        severity: Severity::High,
        message: format!("{metric} too high"),
        value: 99.0,
        threshold: 80.0,
    }
}

#[tokio::test]
async fn test_concurrent_appends_stay_ordered_and_bounded() {
    let storage = StorageHandle::in_memory(50);

    let writers = (0..10).map(|task| {
        let storage = storage.clone();
        tokio::spawn(async move {
            for i in 0..20 {
                storage
                    .append(network(task as f64, i as f64))
                    .await
                    .unwrap()
                    .unwrap();
            }
        })
    });
    for result in join_all(writers).await {
        result.unwrap();
    }

    let samples = storage.latest(Category::Network, 1000).await.unwrap();
    assert_eq!(samples.len(), 50);
    assert!(
        samples
            .windows(2)
            .all(|pair| pair[0].timestamp <= pair[1].timestamp)
    );

    let stats = storage.get_stats().await.unwrap();
    assert_eq!(stats.appends, 200);
}

#[tokio::test]
async fn test_concurrent_submissions_raise_once() {
    let storage = StorageHandle::in_memory(100);
    let alerts = AlertHandle::spawn(
        AlertManager::new(CooldownState::new(Duration::from_secs(15 * 60))),
        Box::new(LogNotifier),
        vec![],
        storage.clone(),
    );

    let submissions = (0..20).map(|_| {
        let alerts = alerts.clone();
        tokio::spawn(async move { alerts.submit(vec![candidate("cpu_percent")]).await })
    });
    let raised: usize = join_all(submissions)
        .await
        .into_iter()
        .map(|result| result.unwrap().unwrap().len())
        .sum();

    assert_eq!(raised, 1);

    let stats = alerts.get_stats().await.unwrap();
    assert_eq!(stats.raised, 1);
    assert_eq!(stats.suppressed, 19);
    assert_eq!(
        storage
            .query_alerts(AlertFilter::default())
            .await
            .unwrap()
            .len(),
        1
    );

    alerts.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_readers_run_alongside_collectors() {
    let mut config = idle_config();
    config.intervals.network_secs = 1;
    let storage = StorageHandle::in_memory(1000);
    let engine = Engine::with_sources(
        &config,
        storage.clone(),
        Box::new(LogNotifier),
        vec![Box::new(StaticSource::new(vec![network(1.0, 1.0)]))],
    );

    let readers = (0..5).map(|_| {
        let storage = storage.clone();
        tokio::spawn(async move {
            for _ in 0..20 {
                storage.latest(Category::Network, 10).await.unwrap();
                storage.alert_summary().await.unwrap();
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
    });
    let poller = {
        let collector = engine.collector(Category::Network).unwrap().clone();
        tokio::spawn(async move {
            for _ in 0..10 {
                collector.poll_now().await.unwrap();
            }
        })
    };

    for result in join_all(readers).await {
        result.unwrap();
    }
    poller.await.unwrap();

    let stats = storage.get_stats().await.unwrap();
    assert!(stats.records["network"] >= 10);

    engine.shutdown().await.unwrap();
}
