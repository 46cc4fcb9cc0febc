//! API Module
//!
//! HTTP API layer for the server.
//! Each submodule handles endpoints for a specific domain.

pub mod deployment;
pub mod error;
pub mod health;

use axum::{
    Router,
    routing::{get, post},
};
use rackforge_store::ObjectStore;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared state for all API handlers
///
/// Explicitly constructed at startup and injected through axum; there are no
/// ambient singletons for the pool or the store client.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub store: Arc<dyn ObjectStore>,
    pub blob_bucket: String,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Deployment endpoints
        .route("/api/deployments", post(deployment::create_deployment))
        .route("/api/deployments", get(deployment::list_deployments))
        .route(
            "/api/deployments/{job_id}/logs",
            get(deployment::get_deployment_logs),
        )
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
