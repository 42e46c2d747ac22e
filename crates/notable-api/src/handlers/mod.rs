//! HTTP handlers.

pub mod notes;
pub mod users;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Fallback for unknown routes.
pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "message": "Not found" })))
}

/// `{message}` response body.
pub(crate) fn message(text: &str) -> Json<serde_json::Value> {
    Json(json!({ "message": text }))
}
