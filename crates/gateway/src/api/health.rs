use axum::response::{IntoResponse, Json};

/// `GET /health`: liveness probe (public, no auth).
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
