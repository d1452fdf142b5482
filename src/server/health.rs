//! Liveness endpoints.
//!
//! `GET /health` is for load balancers and orchestration probes; `GET /`
//! is a greeting for humans poking at the deployment.

use axum::http::StatusCode;

/// Health check handler.
///
/// Returns 200 OK with the text "OK".
pub async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

/// Index handler.
pub async fn index_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "Hi! 🐍🐍🐍")
}
