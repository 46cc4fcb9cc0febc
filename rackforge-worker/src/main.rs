//! Rackforge Worker
//!
//! A background worker that executes deployment jobs created through the
//! API server.
//!
//! Architecture:
//! - Configuration: settings and credentials from the environment
//! - Repository: claims pending jobs with a conditional status transition
//! - Pipeline: renders the Terraform template, runs init and plan, and
//!   persists artifacts to the blob store
//! - Poller: discovers pending jobs and drives them concurrently
//!
//! The worker polls Postgres for `pending` jobs, renders each job's vSphere
//! template in a scratch workspace, invokes Terraform against it, and
//! records the outcome on the job record.

mod config;
mod deployer;
mod error;
mod poller;
mod repository;
mod template;
mod terraform;

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::deployer::{Deployer, Pipeline};
use crate::poller::JobPoller;
use crate::terraform::TerraformCli;
use rackforge_store::S3BlobStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rackforge_worker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Rackforge worker");

    // Load configuration
    let config = Config::from_env()?;
    config.validate()?;
    info!(
        "Loaded configuration: terraform={}, template={}, bucket={}",
        config.terraform_bin,
        config.template_path.display(),
        config.blob_bucket
    );

    // Database connection pool
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database_url)
        .await?;

    info!("Database connection pool created");

    // Blob store client
    let store = Arc::new(S3BlobStore::connect(&config.store).await);

    // Provisioning pipeline with the real Terraform binary
    let provisioner = Arc::new(TerraformCli::new(
        config.terraform_bin.clone(),
        config.step_timeout,
    ));

    let pipeline = Pipeline::new(
        store,
        provisioner,
        config.blob_bucket.clone(),
        config.template_path.clone(),
        config.vsphere.clone(),
    );

    let deployer = Arc::new(Deployer::new(pool.clone(), pipeline));

    // Create job poller
    let poller = JobPoller::new(
        pool,
        deployer,
        config.poll_interval,
        config.max_parallel_jobs,
    );

    info!("Worker initialized successfully");

    // Start polling loop
    if let Err(e) = poller.run().await {
        error!("Poller error: {}", e);
        return Err(e);
    }

    Ok(())
}
