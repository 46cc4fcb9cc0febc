//! Worker-side job queries
//!
//! The pending rows in `deployment_jobs` are the work queue. Claiming is a
//! conditional transition (`pending -> running` in a single UPDATE), so a
//! job id delivered more than once is executed at most once.

use rackforge_core::domain::job::{DeploymentJob, JobStatus};
use sqlx::PgPool;
use uuid::Uuid;

/// Outcome of attempting to claim a job for execution
#[derive(Debug)]
pub enum Claim {
    /// The job was `pending` and is now `running`, owned by this worker
    Claimed(DeploymentJob),
    /// The job exists but another run already moved it past `pending`
    AlreadyTaken(JobStatus),
    /// No job with this id exists
    Missing,
}

/// List ids of jobs waiting for execution, oldest first
pub async fn pending_job_ids(pool: &PgPool) -> Result<Vec<Uuid>, sqlx::Error> {
    let rows: Vec<(Uuid,)> = sqlx::query_as(
        r#"
        SELECT id FROM deployment_jobs
        WHERE status = $1
        ORDER BY created_at ASC
        "#,
    )
    .bind(JobStatus::Pending.as_str())
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.0).collect())
}

/// Atomically transition a job from `pending` to `running` and return it
///
/// The status is persisted before any rendering or execution begins, so a
/// concurrent reader sees `running` as soon as work starts.
pub async fn claim(pool: &PgPool, id: Uuid) -> Result<Claim, sqlx::Error> {
    let row = sqlx::query_as::<_, JobRow>(
        r#"
        UPDATE deployment_jobs
        SET status = $1
        WHERE id = $2 AND status = $3
        RETURNING id, name, vm_name, vm_count, cpu, memory_mb,
                  datacenter_id, cluster_id, network_id, datastore,
                  blob_reference, log_excerpt, status, created_at
        "#,
    )
    .bind(JobStatus::Running.as_str())
    .bind(id)
    .bind(JobStatus::Pending.as_str())
    .fetch_optional(pool)
    .await?;

    if let Some(row) = row {
        return Ok(Claim::Claimed(row.into()));
    }

    // The conditional update matched nothing: either the row is gone or it
    // was already claimed.
    let status: Option<(String,)> =
        sqlx::query_as("SELECT status FROM deployment_jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;

    match status {
        Some((s,)) => Ok(Claim::AlreadyTaken(
            JobStatus::parse(&s).unwrap_or(JobStatus::Failed),
        )),
        None => Ok(Claim::Missing),
    }
}

/// Names of the inventory rows a job references
#[derive(Debug, Clone, Default)]
pub struct TargetNames {
    pub datacenter: Option<String>,
    pub cluster: Option<String>,
    pub network: Option<String>,
}

/// Resolve the datacenter/cluster/network names referenced by a job
pub async fn target_names(pool: &PgPool, job: &DeploymentJob) -> Result<TargetNames, sqlx::Error> {
    Ok(TargetNames {
        datacenter: name_of(
            pool,
            "SELECT name FROM datacenters WHERE id = $1",
            Some(job.datacenter_id),
        )
        .await?,
        cluster: name_of(pool, "SELECT name FROM clusters WHERE id = $1", job.cluster_id).await?,
        network: name_of(pool, "SELECT name FROM networks WHERE id = $1", job.network_id).await?,
    })
}

async fn name_of(pool: &PgPool, query: &str, id: Option<i64>) -> Result<Option<String>, sqlx::Error> {
    let Some(id) = id else {
        return Ok(None);
    };

    let row: Option<(String,)> = sqlx::query_as(query).bind(id).fetch_optional(pool).await?;
    Ok(row.map(|r| r.0))
}

/// Persist a job's terminal state
///
/// Status, blob reference and log excerpt land in one write so a reader
/// never observes a terminal status without its artifacts.
pub async fn mark_finished(
    pool: &PgPool,
    id: Uuid,
    status: JobStatus,
    blob_reference: Option<&str>,
    log_excerpt: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE deployment_jobs
        SET status = $1,
            blob_reference = COALESCE($2, blob_reference),
            log_excerpt = COALESCE($3, log_excerpt)
        WHERE id = $4
        "#,
    )
    .bind(status.as_str())
    .bind(blob_reference)
    .bind(log_excerpt)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
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
