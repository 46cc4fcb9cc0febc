//! Deployment job repository
//!
//! Handles all database operations related to deployment jobs. The server
//! only ever inserts jobs in `pending` state and reads them back; status
//! mutation belongs to the worker.

use rackforge_core::domain::job::{DeploymentJob, JobStatus};
use rackforge_core::dto::job::CreateDeployment;
use sqlx::PgPool;
use uuid::Uuid;

/// Create a new deployment job in `pending` state
pub async fn create(pool: &PgPool, req: &CreateDeployment) -> Result<DeploymentJob, sqlx::Error> {
    let id = Uuid::new_v4();
    let now = chrono::Utc::now();

    let job = DeploymentJob {
        id,
        name: req.name.clone(),
        vm_name: req.vm_name.clone(),
        vm_count: req.vm_count,
        cpu: req.cpu,
        memory_mb: req.memory,
        datacenter_id: req.datacenter,
        cluster_id: req.cluster,
        network_id: req.network,
        datastore: req.datastore.clone(),
        blob_reference: None,
        log_excerpt: None,
        status: JobStatus::Pending,
        created_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO deployment_jobs
            (id, name, vm_name, vm_count, cpu, memory_mb,
             datacenter_id, cluster_id, network_id, datastore,
             status, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(id)
    .bind(&job.name)
    .bind(&job.vm_name)
    .bind(job.vm_count)
    .bind(job.cpu)
    .bind(job.memory_mb)
    .bind(job.datacenter_id)
    .bind(job.cluster_id)
    .bind(job.network_id)
    .bind(&job.datastore)
    .bind(JobStatus::Pending.as_str())
    .bind(now)
    .execute(pool)
    .await?;

    Ok(job)
}

/// Find a job by ID
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<DeploymentJob>, sqlx::Error> {
    let row = sqlx::query_as::<_, JobRow>(
        r#"
        SELECT id, name, vm_name, vm_count, cpu, memory_mb,
               datacenter_id, cluster_id, network_id, datastore,
               blob_reference, log_excerpt, status, created_at
        FROM deployment_jobs
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.into()))
}

/// List all jobs, most recent first
pub async fn list_all(pool: &PgPool) -> Result<Vec<DeploymentJob>, sqlx::Error> {
    let rows = sqlx::query_as::<_, JobRow>(
        r#"
        SELECT id, name, vm_name, vm_count, cpu, memory_mb,
               datacenter_id, cluster_id, network_id, datastore,
               blob_reference, log_excerpt, status, created_at
        FROM deployment_jobs
        ORDER BY created_at DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    name: String,
    vm_name: String,
    vm_count: i32,
    cpu: i32,
    memory_mb: i32,
    datacenter_id: i64,
    cluster_id: Option<i64>,
    network_id: Option<i64>,
    datastore: String,
    blob_reference: Option<String>,
    log_excerpt: Option<String>,
    status: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<JobRow> for DeploymentJob {
    fn from(row: JobRow) -> Self {
        DeploymentJob {
            id: row.id,
            name: row.name,
            vm_name: row.vm_name,
            vm_count: row.vm_count,
            cpu: row.cpu,
            memory_mb: row.memory_mb,
            datacenter_id: row.datacenter_id,
            cluster_id: row.cluster_id,
            network_id: row.network_id,
            datastore: row.datastore,
            blob_reference: row.blob_reference,
            log_excerpt: row.log_excerpt,
            status: JobStatus::parse(&row.status).unwrap_or(JobStatus::Failed),
            created_at: row.created_at,
        }
    }
}
