use anyhow::Result;
use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tokio::signal;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::{analytics, handlers};
use crate::config::ServerConfig;
use crate::ml::PriceEngine;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<PriceEngine>,
    pub metrics: Option<PrometheusHandle>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(engine: Arc<PriceEngine>, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            engine,
            metrics,
            started_at: Utc::now(),
        }
    }
}

pub struct ApiServer {
    config: ServerConfig,
    state: AppState,
}

impl ApiServer {
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone(), &self.config.cors_allowed_origins)
    }

    pub async fn start(self) -> Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let app = self.router();

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("Price prediction API listening on http://{}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Server stopped");
        Ok(())
    }
}

pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(handlers::service_info))
        .route("/health", get(handlers::health_check))
        .route("/predecir", post(handlers::predict_price))
        .route("/metrics", get(handlers::render_metrics))
        .route("/analytics/global", get(analytics::global_stats))
        .route("/analytics/compare", get(analytics::compare))
        .route("/webhook", post(analytics::receive_webhook))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(allowed))
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, stopping server...");
}
