use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde_json::{Value, json};

/// `GET /health`
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

/// `GET /healthz`
pub async fn liveness() -> &'static str {
    "ok"
}
