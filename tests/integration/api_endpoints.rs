//! Integration tests for the REST API
//!
//! Requests go straight through the router with `tower::ServiceExt::oneshot`,
//! no socket involved.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::Utc;
use network_monitoring::Category;
use network_monitoring::actors::{AlertHandle, StorageHandle};
use network_monitoring::alerts::{AlertEvent, AlertManager, CooldownState, Severity};
use network_monitoring::api::{ApiConfig, ApiState, router};
use network_monitoring::evaluation::CandidateAlert;
use network_monitoring::notify::LogNotifier;
use serde_json::Value;
use tower::ServiceExt;

use crate::helpers::*;

struct TestApi {
    app: Router,
    storage: StorageHandle,
}

fn spawn_api(config: ApiConfig) -> TestApi {
    let storage = StorageHandle::in_memory(100);
    let alerts = AlertHandle::spawn(
        AlertManager::new(CooldownState::new(std::time::Duration::from_secs(15 * 60))),
        Box::new(LogNotifier),
        vec![],
        storage.clone(),
    );
    let state = ApiState::new(storage.clone(), alerts, vec![Category::Network]);

    TestApi {
        app: router(&config, state),
        storage,
    }
}

fn alert(metric: &str, severity: Severity) -> AlertEvent {
    AlertEvent::raise(
        CandidateAlert {
            category: Category::Network,
            metric_name: metric.to_string(),
            device_ip: None,
            severity,
            message: format!("{metric} above limit"),
            value: 150.0,
            threshold: 100.0,
        },
        Utc::now(),
    )
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

#[tokio::test]
async fn test_health_check() {
    let api = spawn_api(ApiConfig::default());

    let (status, body) = get(&api.app, "/api/v1/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_stats_lists_collectors_and_counters() {
    let api = spawn_api(ApiConfig::default());
    api.storage.append(network(1.0, 1.0)).await.unwrap().unwrap();

    let (status, body) = get(&api.app, "/api/v1/stats").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["collectors"], serde_json::json!(["network"]));
    assert_eq!(body["storage"]["appends"], 1);
    assert_eq!(body["storage"]["records"]["network"], 1);
    assert_eq!(body["alerts"]["raised"], 0);
}

#[tokio::test]
async fn test_metrics_by_category() {
    let api = spawn_api(ApiConfig::default());
    for upload in [1.0, 2.0, 3.0] {
        api.storage
            .append(network(upload, 0.0))
            .await
            .unwrap()
            .unwrap();
    }
    api.storage
        .append(system(5.0, 5.0, 5.0))
        .await
        .unwrap()
        .unwrap();

    let (status, body) = get(&api.app, "/api/v1/metrics/network").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["category"], "network");
    assert_eq!(body["count"], 3);
    assert_eq!(body["samples"][0]["upload_mbps"], 1.0);

    let (_, body) = get(&api.app, "/api/v1/metrics/network?limit=2").await;
    assert_eq!(body["count"], 2);
    assert_eq!(body["samples"][1]["upload_mbps"], 3.0);

    let (_, body) = get(&api.app, "/api/v1/metrics/network/latest").await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["samples"][0]["upload_mbps"], 3.0);

    let (_, body) = get(&api.app, "/api/v1/metrics/device").await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_unknown_category_is_rejected() {
    let api = spawn_api(ApiConfig::default());

    let (status, _) = get(&api.app, "/api/v1/metrics/disk").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_device_samples_by_ip() {
    let api = spawn_api(ApiConfig::default());
    api.storage
        .append(device("10.0.0.1", Some(3.0)))
        .await
        .unwrap()
        .unwrap();
    api.storage
        .append(device("10.0.0.2", None))
        .await
        .unwrap()
        .unwrap();

    let (status, body) = get(&api.app, "/api/v1/devices/10.0.0.2/samples").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["samples"][0]["is_reachable"], false);

    let (status, _) = get(&api.app, "/api/v1/devices/not-an-ip/samples").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_alerts_filter_and_summary() {
    let api = spawn_api(ApiConfig::default());
    for (metric, severity) in [
        ("upload_mbps", Severity::High),
        ("download_mbps", Severity::High),
        ("bandwidth_spike", Severity::Medium),
    ] {
        api.storage
            .append_alert(alert(metric, severity))
            .await
            .unwrap()
            .unwrap();
    }

    let (status, body) = get(&api.app, "/api/v1/alerts").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);

    let (_, body) = get(&api.app, "/api/v1/alerts?severity=high").await;
    assert_eq!(body["count"], 2);

    let (_, body) = get(&api.app, "/api/v1/alerts?limit=1").await;
    assert_eq!(body["alerts"][0]["metric_name"], "bandwidth_spike");

    let (status, _) = get(&api.app, "/api/v1/alerts?severity=urgent").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = get(&api.app, "/api/v1/alerts/summary").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["unresolved"], 3);
    assert_eq!(body["by_severity"]["high"], 2);
    assert_eq!(body["last_24h"], 3);
}

#[tokio::test]
async fn test_resolve_alert() {
    let api = spawn_api(ApiConfig::default());
    let raised = alert("upload_mbps", Severity::High);
    let id = raised.id;
    api.storage.append_alert(raised).await.unwrap().unwrap();

    let resolve = |id: String| {
        Request::post(format!("/api/v1/alerts/{id}/resolve"))
            .body(Body::empty())
            .unwrap()
    };

    let (status, body) = send(&api.app, resolve(id.to_string())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resolved"], true);

    let (status, body) = send(&api.app, resolve(uuid::Uuid::new_v4().to_string())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());

    let (_, body) = get(&api.app, "/api/v1/alerts/summary").await;
    assert_eq!(body["unresolved"], 0);
}

#[tokio::test]
async fn test_bearer_token_required_when_configured() {
    let config = ApiConfig {
        auth_token: Some("s3cret".to_string()),
        ..ApiConfig::default()
    };
    let api = spawn_api(config);

    let (status, _) = get(&api.app, "/api/v1/health").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = get(&api.app, "/api/v1/stats").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let with_auth = |value: &str| {
        Request::get("/api/v1/stats")
            .header(header::AUTHORIZATION, value)
            .body(Body::empty())
            .unwrap()
    };

    let (status, _) = send(&api.app, with_auth("s3cret")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&api.app, with_auth("Bearer wrong")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&api.app, with_auth("Bearer s3cret")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["storage"].is_object());
}
