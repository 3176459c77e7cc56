//! Health and readiness probes.

use axum::Json;
use serde_json::{json, Value};

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /ready
pub async fn ready() -> Json<Value> {
    Json(json!({ "ready": true }))
}
