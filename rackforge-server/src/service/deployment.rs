//! Deployment service
//!
//! Business logic for deployment job creation and log retrieval.
//!
//! Creating a job only validates the request and persists a `pending` row;
//! the worker discovers pending rows on its own, so the insert itself is the
//! enqueue. Errors during the actual run are never surfaced here — callers
//! observe them by polling job status.

use rackforge_core::domain::job::DeploymentJob;
use rackforge_core::dto::job::CreateDeployment;
use rackforge_store::{ObjectStore, StoreError, log_key};
use sqlx::PgPool;
use uuid::Uuid;

use crate::repository::{inventory_repository, job_repository};

/// Service error type
#[derive(Debug)]
pub enum DeploymentError {
    NotFound(Uuid),
    ValidationError(String),
    /// The log object for this job is not in the store yet
    LogsNotReady(Uuid),
    StoreUnavailable(String),
    DatabaseError(sqlx::Error),
}

impl From<sqlx::Error> for DeploymentError {
    fn from(err: sqlx::Error) -> Self {
        DeploymentError::DatabaseError(err)
    }
}

/// Validate and persist a new deployment job in `pending` state
pub async fn create_deployment(
    pool: &PgPool,
    req: CreateDeployment,
) -> Result<DeploymentJob, DeploymentError> {
    validate_shape(&req).map_err(DeploymentError::ValidationError)?;

    // Referenced inventory rows must exist before the job is accepted
    if !inventory_repository::datacenter_exists(pool, req.datacenter).await? {
        return Err(DeploymentError::ValidationError(format!(
            "datacenter {} does not exist",
            req.datacenter
        )));
    }

    if let Some(cluster) = req.cluster {
        if !inventory_repository::cluster_exists(pool, cluster).await? {
            return Err(DeploymentError::ValidationError(format!(
                "cluster {} does not exist",
                cluster
            )));
        }
    }

    if let Some(network) = req.network {
        if !inventory_repository::network_exists(pool, network).await? {
            return Err(DeploymentError::ValidationError(format!(
                "network {} does not exist",
                network
            )));
        }
    }

    let job = job_repository::create(pool, &req).await?;

    tracing::info!("Deployment job created: {} ({})", job.id, job.name);

    Ok(job)
}

/// List all deployment jobs, most recent first
pub async fn list_deployments(pool: &PgPool) -> Result<Vec<DeploymentJob>, DeploymentError> {
    let jobs = job_repository::list_all(pool).await?;
    Ok(jobs)
}

/// Fetch the full run log for a job from the blob store
///
/// Reads the store directly rather than the in-database excerpt, so the
/// caller gets the complete output. The job must exist; the log object may
/// lag behind while the run is still in progress.
pub async fn fetch_logs(
    pool: &PgPool,
    store: &dyn ObjectStore,
    bucket: &str,
    job_id: Uuid,
) -> Result<String, DeploymentError> {
    let job = job_repository::find_by_id(pool, job_id)
        .await?
        .ok_or(DeploymentError::NotFound(job_id))?;

    let key = log_key(job.id);

    let bytes = store.get(bucket, &key).await.map_err(|err| match err {
        StoreError::NotFound { .. } => DeploymentError::LogsNotReady(job_id),
        StoreError::Unavailable(msg) => DeploymentError::StoreUnavailable(msg),
    })?;

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

// =============================================================================
// Validation
// =============================================================================

/// Field-shape validation that needs no database access
fn validate_shape(req: &CreateDeployment) -> Result<(), String> {
    if req.name.trim().is_empty() {
        return Err("name cannot be empty".to_string());
    }

    if req.vm_name.trim().is_empty() {
        return Err("vm_name cannot be empty".to_string());
    }

    if req.vm_count < 1 {
        return Err(format!("vm_count must be at least 1, got {}", req.vm_count));
    }

    if req.cpu < 1 {
        return Err(format!("cpu must be positive, got {}", req.cpu));
    }

    if req.memory < 1 {
        return Err(format!("memory must be positive, got {}", req.memory));
    }

    Ok(())
}
