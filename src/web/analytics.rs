//! Placeholder analytics and the webhook receiver. Analytics values are
//! fixed sample data; nothing here reads prediction traffic.

use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct WebhookReceipt {
    pub received: bool,
    pub id: Uuid,
    pub received_at: DateTime<Utc>,
}

pub async fn global_stats() -> Json<Value> {
    Json(json!({
        "mock": true,
        "total_predictions": 1250,
        "average_price": 24_380.75,
        "average_mileage": 61_420,
        "most_common_year": 2018,
        "price_range": { "min": 2_500.0, "max": 89_900.0 }
    }))
}

pub async fn compare() -> Json<Value> {
    Json(json!({
        "mock": true,
        "segments": [
            { "label": "0-30k miles", "average_price": 34_150.0 },
            { "label": "30k-80k miles", "average_price": 23_870.0 },
            { "label": "80k+ miles", "average_price": 12_420.0 }
        ],
        "market_trend": "stable"
    }))
}

pub async fn receive_webhook(Json(payload): Json<Value>) -> Json<WebhookReceipt> {
    let receipt = WebhookReceipt {
        received: true,
        id: Uuid::new_v4(),
        received_at: Utc::now(),
    };
    info!("Webhook {} received: {}", receipt.id, payload);
    Json(receipt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::PriceEngine;
    use crate::web::server::{build_router, AppState};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> axum::Router {
        build_router(
            AppState::new(Arc::new(PriceEngine::unavailable("not needed")), None),
            &[],
        )
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn analytics_endpoints_return_static_content() {
        for uri in ["/analytics/global", "/analytics/compare"] {
            let first = app()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(first.status(), StatusCode::OK);
            let first = body_json(first).await;

            let second = app()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(body_json(second).await, first);
            assert_eq!(first["mock"], json!(true));
        }
    }

    #[tokio::test]
    async fn webhook_acknowledges_any_json() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/webhook")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"event":"prediction","price":25000}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["received"], json!(true));
        assert!(Uuid::parse_str(json["id"].as_str().unwrap()).is_ok());
    }
}
