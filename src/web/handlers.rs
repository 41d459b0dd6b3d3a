use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Instant;
use tracing::{debug, warn};

use super::server::AppState;
use crate::data::dataset::deserialize_year;
use crate::error::ApiError;
use crate::ml::{ModelSource, VehicleQuery};

pub const SERVICE_NAME: &str = "Used Car Price Predictor API";
pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Deserialize)]
pub struct PredictionRequest {
    pub mileage: f64,
    #[serde(deserialize_with = "deserialize_year")]
    pub year: i32,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PredictionResponse {
    pub success: bool,
    pub mileage: f64,
    pub year: i32,
    pub estimated_price: f64,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_loaded: bool,
    pub model_source: ModelSource,
    pub version: &'static str,
    pub uptime_seconds: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

pub async fn service_info() -> Json<Value> {
    Json(json!({
        "name": SERVICE_NAME,
        "version": SERVICE_VERSION,
        "status": "active",
        "endpoints": {
            "GET /": "Service information",
            "GET /health": "Service health",
            "POST /predecir": "Predict a used car price",
            "GET /analytics/global": "Aggregate statistics (sample data)",
            "GET /analytics/compare": "Market comparison (sample data)",
            "POST /webhook": "Generic webhook receiver",
            "GET /metrics": "Prometheus metrics"
        },
        "example": {
            "url": "/predecir",
            "method": "POST",
            "body": { "mileage": 50000, "year": 2020 }
        }
    }))
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let engine = &state.engine;
    let model_loaded = engine.is_ready();

    Json(HealthResponse {
        status: if model_loaded { "healthy" } else { "unhealthy" },
        model_loaded,
        model_source: engine.source(),
        version: SERVICE_VERSION,
        uptime_seconds: (chrono::Utc::now() - state.started_at).num_seconds(),
        detail: engine.failure().map(str::to_string),
    })
}

pub async fn predict_price(
    State(state): State<AppState>,
    payload: Result<Json<PredictionRequest>, JsonRejection>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        metrics::counter!("price_predictions_total", "outcome" => "rejected").increment(1);
        ApiError::Validation(rejection.body_text())
    })?;

    let query = VehicleQuery::new(request.mileage, request.year).map_err(|e| {
        metrics::counter!("price_predictions_total", "outcome" => "rejected").increment(1);
        ApiError::from(e)
    })?;

    if let Some(email) = &request.email {
        debug!("Prediction requested with notification address {}", email);
    }

    let started = Instant::now();
    let estimate = state.engine.estimate(&query).map_err(|e| {
        warn!("Prediction failed: {}", e);
        metrics::counter!("price_predictions_total", "outcome" => "error").increment(1);
        ApiError::from(e)
    })?;

    metrics::histogram!("price_prediction_latency_seconds")
        .record(started.elapsed().as_secs_f64());
    metrics::counter!("price_predictions_total", "outcome" => "success").increment(1);

    Ok(Json(PredictionResponse {
        success: true,
        mileage: query.mileage(),
        year: query.year(),
        estimated_price: estimate.price,
        message: estimate.message().to_string(),
    }))
}

pub async fn render_metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
