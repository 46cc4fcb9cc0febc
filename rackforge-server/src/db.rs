use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Inventory reference tables. Only the names are consumed by the
    // deployment pipeline; full inventory management lives elsewhere.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS datacenters (
            id BIGSERIAL PRIMARY KEY,
            name VARCHAR(100) NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS clusters (
            id BIGSERIAL PRIMARY KEY,
            name VARCHAR(100) NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS networks (
            id BIGSERIAL PRIMARY KEY,
            name VARCHAR(100) NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create deployment jobs table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS deployment_jobs (
            id UUID PRIMARY KEY,
            name VARCHAR(255) NOT NULL,
            vm_name VARCHAR(255) NOT NULL,
            vm_count INTEGER NOT NULL,
            cpu INTEGER NOT NULL,
            memory_mb INTEGER NOT NULL,
            datacenter_id BIGINT NOT NULL REFERENCES datacenters(id),
            cluster_id BIGINT REFERENCES clusters(id),
            network_id BIGINT REFERENCES networks(id),
            datastore VARCHAR(255) NOT NULL,
            blob_reference TEXT,
            log_excerpt TEXT,
            status VARCHAR(20) NOT NULL,
            created_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for better query performance
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_deployment_jobs_status ON deployment_jobs(status)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_deployment_jobs_created_at ON deployment_jobs(created_at DESC)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
