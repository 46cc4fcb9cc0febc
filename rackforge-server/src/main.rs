use std::sync::Arc;

use rackforge_store::S3BlobStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod config;
pub mod db;
pub mod repository;
pub mod service;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rackforge_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Rackforge API server...");

    let config = config::Config::from_env()?;

    tracing::info!("Connecting to database...");

    // Create database connection pool
    let pool = db::create_pool(&config.database_url).await?;

    tracing::info!("Database connection pool created");

    // Run migrations
    db::run_migrations(&pool).await?;

    // Blob store client for the log-fetch path
    let store = Arc::new(S3BlobStore::connect(&config.store).await);

    // Build router with all API endpoints
    let app = api::create_router(api::AppState {
        pool,
        store,
        blob_bucket: config.blob_bucket.clone(),
    });

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    axum::serve(listener, app).await?;

    Ok(())
}
