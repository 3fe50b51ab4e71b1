//! Liveness probe endpoint.

use axum::http::StatusCode;

/// Health check handler. Returns 200 `OK` whenever the server is up and
/// accepting connections.
pub async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}
