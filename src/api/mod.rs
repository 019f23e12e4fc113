//! Read-only REST API over the stored metrics and alerts
//!
//! ## Endpoints
//!
//! - `GET /api/v1/health` - Health check (never requires a token)
//! - `GET /api/v1/stats` - Storage and alert statistics
//! - `GET /api/v1/metrics/:category` - Samples in a time range
//! - `GET /api/v1/metrics/:category/latest` - Most recent samples
//! - `GET /api/v1/devices/:ip/samples` - Samples of one device
//! - `GET /api/v1/alerts` - Alert log, optionally filtered by severity
//! - `GET /api/v1/alerts/summary` - Alert counts
//! - `POST /api/v1/alerts/:id/resolve` - Mark an alert resolved

#[cfg(feature = "api")]
pub mod error;
#[cfg(feature = "api")]
pub mod middleware;
#[cfg(feature = "api")]
pub mod routes;
#[cfg(feature = "api")]
pub mod state;
#[cfg(feature = "api")]
pub mod types;

pub use crate::config::ApiConfig;

#[cfg(feature = "api")]
pub use error::{ApiError, ApiResult};
#[cfg(feature = "api")]
pub use state::ApiState;

#[cfg(feature = "api")]
use axum::{
    Router,
    routing::{get, post},
};
#[cfg(feature = "api")]
use std::net::SocketAddr;
#[cfg(feature = "api")]
use tracing::info;

/// Build the API router with the layers enabled in `config`
#[cfg(feature = "api")]
pub fn router(config: &ApiConfig, state: ApiState) -> Router {
    use tower_http::cors::{Any, CorsLayer};
    use tower_http::trace::TraceLayer;

    let mut app = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .route("/api/v1/stats", get(routes::stats::get_stats))
        .route("/api/v1/metrics/:category", get(routes::metrics::get_metrics))
        .route(
            "/api/v1/metrics/:category/latest",
            get(routes::metrics::get_latest_metrics),
        )
        .route(
            "/api/v1/devices/:ip/samples",
            get(routes::metrics::get_device_samples),
        )
        .route("/api/v1/alerts", get(routes::alerts::list_alerts))
        .route("/api/v1/alerts/summary", get(routes::alerts::get_summary))
        .route(
            "/api/v1/alerts/:id/resolve",
            post(routes::alerts::resolve_alert),
        )
        .with_state(state);

    if let Some(token) = config.auth_token.clone() {
        app = app.layer(axum::middleware::from_fn_with_state(
            token,
            middleware::auth::auth_middleware,
        ));
    }

    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    app.layer(TraceLayer::new_for_http())
}

/// Spawn the API server
///
/// Starts an Axum HTTP server in a background task and returns the address
/// it is bound to.
#[cfg(feature = "api")]
pub async fn spawn_api_server(config: ApiConfig, state: ApiState) -> anyhow::Result<SocketAddr> {
    info!("starting API server on {}", config.bind_addr);

    let app = router(&config, state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(addr)
}
