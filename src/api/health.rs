//! Liveness check for the dashboard API. Answers even when no backend is configured.

use axum::Json;
use serde_json::{json, Value};

pub async fn health() -> Json<Value> {
    Json(json!({ "ok": true, "api": "health" }))
}
