//! Liveness probe
//!
//! Process-level only. Database and blob store health surface through the
//! deployment endpoints' own error mapping, not through this probe.

use axum::{http::StatusCode, response::IntoResponse};

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
