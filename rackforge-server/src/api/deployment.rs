//! Deployment API Handlers
//!
//! HTTP endpoints for the deployment job pipeline. Creation returns as soon
//! as the job is persisted in `pending` state; the worker picks it up later.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rackforge_core::domain::job::DeploymentJob;
use rackforge_core::dto::job::{CreateDeployment, DeploymentAccepted, DeploymentLogs};
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};
use crate::service::deployment_service::{self, DeploymentError};

/// POST /api/deployments
/// Validate and enqueue a new deployment job
pub async fn create_deployment(
    State(state): State<AppState>,
    Json(req): Json<CreateDeployment>,
) -> ApiResult<(StatusCode, Json<DeploymentAccepted>)> {
    tracing::info!("Creating deployment job: {}", req.name);

    let job = deployment_service::create_deployment(&state.pool, req)
        .await
        .map_err(map_error)?;

    let response = DeploymentAccepted {
        message: "Deployment started.".to_string(),
        job_id: job.id,
        status: job.status,
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/deployments
/// List all deployment jobs, most recent first
pub async fn list_deployments(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<DeploymentJob>>> {
    tracing::debug!("Listing deployment jobs");

    let jobs = deployment_service::list_deployments(&state.pool)
        .await
        .map_err(map_error)?;

    Ok(Json(jobs))
}

/// GET /api/deployments/{job_id}/logs
/// Fetch the full run log for a job from the blob store
pub async fn get_deployment_logs(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<DeploymentLogs>> {
    tracing::debug!("Fetching logs for deployment job: {}", job_id);

    let logs = deployment_service::fetch_logs(
        &state.pool,
        state.store.as_ref(),
        &state.blob_bucket,
        job_id,
    )
    .await
    .map_err(map_error)?;

    Ok(Json(DeploymentLogs { logs }))
}

fn map_error(err: DeploymentError) -> ApiError {
    match err {
        DeploymentError::NotFound(id) => {
            ApiError::NotFound(format!("Deployment job {} not found", id))
        }
        DeploymentError::ValidationError(msg) => ApiError::BadRequest(msg),
        DeploymentError::LogsNotReady(id) => {
            ApiError::InternalError(format!("Logs for job {} are not available yet", id))
        }
        DeploymentError::StoreUnavailable(msg) => {
            ApiError::BadGateway(format!("Failed to retrieve logs: {}", msg))
        }
        DeploymentError::DatabaseError(err) => ApiError::DatabaseError(err),
    }
}
