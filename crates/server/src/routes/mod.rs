//! API route handlers
//!
//! - `health`: liveness and readiness probes
//! - `push`: push-subscription endpoints, one per stage

pub mod health;
pub mod push;

use crate::error::ServerError;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

/// Service info for `GET /`.
pub async fn api_info() -> impl IntoResponse {
    Json(json!({
        "name": "invoice-pipeline-server",
        "version": env!("CARGO_PKG_VERSION"),
        "api_version": "v1",
        "endpoints": [
            "/v1/classify",
            "/v1/extract",
            "/health",
            "/ready"
        ]
    }))
}

/// 404 Not Found handler
pub async fn not_found() -> ServerError {
    ServerError::NotFound
}
