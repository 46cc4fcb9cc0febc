//! Deployment orchestrator
//!
//! Drives a claimed job through the full pipeline: render the template in a
//! scratch workspace, persist the rendered config, run `terraform init` and
//! `terraform plan`, persist the run log, and finalize the job's status.
//!
//! The provisioning phase is separated from persistence: [`Pipeline`] is a
//! function of the job, its resolved target names, and the injected store
//! and provisioner, returning a [`ProvisionReport`] the [`Deployer`]
//! translates into the terminal status write. Step errors decide the
//! transition explicitly; nothing escapes the worker task.

use std::path::PathBuf;
use std::sync::Arc;

use rackforge_core::domain::job::{DeploymentJob, JobStatus};
use rackforge_store::{ObjectStore, log_key, template_key};
use sqlx::PgPool;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::VsphereCredentials;
use crate::error::DeployError;
use crate::repository::{self, Claim, TargetNames};
use crate::template::{self, TemplateContext, TemplateError};
use crate::terraform::Provisioner;

/// Size of the log prefix stored inline on the job record
pub const LOG_EXCERPT_BYTES: usize = 5000;

/// What a provisioning run produced, independent of how it ended
///
/// `blob_reference` and `log_excerpt` are filled as the run progresses, so
/// a failed run still reports whatever artifacts it managed to persist.
#[derive(Debug)]
pub struct ProvisionReport {
    pub blob_reference: Option<String>,
    pub log_excerpt: Option<String>,
    pub result: Result<(), DeployError>,
}

impl ProvisionReport {
    fn new() -> Self {
        Self {
            blob_reference: None,
            log_excerpt: None,
            result: Ok(()),
        }
    }

    fn from_error(err: DeployError) -> Self {
        Self {
            blob_reference: None,
            log_excerpt: None,
            result: Err(err),
        }
    }
}

/// The provisioning pipeline: render, execute, persist artifacts
pub struct Pipeline {
    store: Arc<dyn ObjectStore>,
    provisioner: Arc<dyn Provisioner>,
    bucket: String,
    template_path: PathBuf,
    vsphere: VsphereCredentials,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        provisioner: Arc<dyn Provisioner>,
        bucket: String,
        template_path: PathBuf,
        vsphere: VsphereCredentials,
    ) -> Self {
        Self {
            store,
            provisioner,
            bucket,
            template_path,
            vsphere,
        }
    }

    /// Runs the provisioning phase for one job.
    pub async fn provision(&self, job: &DeploymentJob, names: &TargetNames) -> ProvisionReport {
        let mut report = ProvisionReport::new();
        let result = self.provision_inner(job, names, &mut report).await;
        report.result = result;
        report
    }

    async fn provision_inner(
        &self,
        job: &DeploymentJob,
        names: &TargetNames,
        report: &mut ProvisionReport,
    ) -> Result<(), DeployError> {
        let datacenter = names
            .datacenter
            .as_deref()
            .ok_or(TemplateError::MissingField("datacenter"))?;

        let ctx = TemplateContext {
            vsphere_server: &self.vsphere.server,
            vsphere_user: &self.vsphere.user,
            vsphere_password: &self.vsphere.password,
            datacenter,
            cluster: names.cluster.as_deref(),
            network: names.network.as_deref(),
            datastore: &job.datastore,
            vm_name: &job.vm_name,
            cpu: job.cpu,
            memory_mb: job.memory_mb,
            vm_count: job.vm_count,
        };

        let source = template::load_template(&self.template_path)?;
        let rendered = template::render(&source, &ctx)?;

        // Scratch workspace, removed on every exit path when dropped
        let workspace = tempfile::tempdir()?;
        let config_path = workspace.path().join("main.tf");
        let log_path = workspace.path().join("logs.txt");

        tokio::fs::write(&config_path, &rendered).await?;

        let reference = self
            .store
            .put(&self.bucket, &template_key(job.id), rendered.into_bytes())
            .await?;
        report.blob_reference = Some(reference);

        // init, then plan, sequentially against the same workspace so
        // provider plugins fetched by init are visible to plan
        let step_result = match self.provisioner.init(workspace.path(), &log_path).await {
            Ok(()) => self.provisioner.plan(workspace.path(), &log_path).await,
            Err(err) => Err(err),
        };

        // Upload whatever output the run produced, even when a step failed,
        // so the failing step's output stays retrievable in full
        match self.persist_log(job.id, &log_path, report).await {
            Ok(()) => {}
            Err(upload_err) => {
                if step_result.is_ok() {
                    return Err(upload_err);
                }
                warn!(
                    "Failed to upload run log for job {}: {}",
                    job.id, upload_err
                );
            }
        }

        step_result
    }

    /// Uploads the full run log and derives the inline excerpt.
    async fn persist_log(
        &self,
        job_id: Uuid,
        log_path: &std::path::Path,
        report: &mut ProvisionReport,
    ) -> Result<(), DeployError> {
        if !log_path.exists() {
            return Ok(());
        }

        let log_bytes = tokio::fs::read(log_path).await?;
        if log_bytes.is_empty() {
            return Ok(());
        }

        report.log_excerpt = Some(truncate_excerpt(&log_bytes, LOG_EXCERPT_BYTES));

        self.store
            .put(&self.bucket, &log_key(job_id), log_bytes)
            .await?;

        Ok(())
    }
}

/// Truncates a run log to its first `limit` bytes.
///
/// Backs off past a split UTF-8 sequence at the cut so the excerpt is
/// always valid text; for ASCII logs the excerpt is the exact byte prefix.
fn truncate_excerpt(log: &[u8], limit: usize) -> String {
    let mut end = log.len().min(limit);

    while end > 0 {
        if let Ok(s) = std::str::from_utf8(&log[..end]) {
            return s.to_string();
        }
        // A char is at most 4 bytes; give up after backing off that far
        if log.len().min(limit) - end >= 3 {
            break;
        }
        end -= 1;
    }

    // The lossy pass widens each invalid byte to a 3-byte replacement
    // char, so the result is cut back to the limit on a char boundary.
    let mut excerpt = String::from_utf8_lossy(&log[..log.len().min(limit)]).into_owned();
    while excerpt.len() > limit {
        excerpt.pop();
    }
    excerpt
}

/// Loads, claims and finalizes jobs around the provisioning pipeline
pub struct Deployer {
    pool: PgPool,
    pipeline: Pipeline,
}

impl Deployer {
    pub fn new(pool: PgPool, pipeline: Pipeline) -> Self {
        Self { pool, pipeline }
    }

    /// Executes one deployment job end to end.
    ///
    /// Run failures end in a persisted `failed` status and are not
    /// re-raised, so the worker task always completes. The only error
    /// returned is [`DeployError::JobNotFound`], where no status mutation
    /// is possible.
    pub async fn run(&self, job_id: Uuid) -> Result<(), DeployError> {
        let job = match repository::claim(&self.pool, job_id).await? {
            Claim::Claimed(job) => job,
            Claim::AlreadyTaken(status) => {
                info!(
                    "Job {} already {} elsewhere, skipping",
                    job_id, status
                );
                return Ok(());
            }
            Claim::Missing => {
                error!("Deployment job {} does not exist", job_id);
                return Err(DeployError::JobNotFound(job_id));
            }
        };

        info!("Job {} claimed, starting provisioning run", job_id);

        let report = match repository::target_names(&self.pool, &job).await {
            Ok(names) => self.pipeline.provision(&job, &names).await,
            Err(err) => ProvisionReport::from_error(err.into()),
        };

        let status = match &report.result {
            Ok(()) => {
                info!("Terraform init and plan completed for job {}", job_id);
                JobStatus::Completed
            }
            Err(err) => {
                error!("Deployment failed for job {}: {}", job_id, err);
                JobStatus::Failed
            }
        };

        // Best-effort: a failure to persist the terminal state is logged,
        // not re-raised, so the worker keeps running
        if let Err(err) = repository::mark_finished(
            &self.pool,
            job_id,
            status,
            report.blob_reference.as_deref(),
            report.log_excerpt.as_deref(),
        )
        .await
        {
            error!(
                "Failed to persist terminal status {} for job {}: {}",
                status, job_id, err
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rackforge_store::{DEFAULT_BUCKET, Result as StoreResult, StoreError};
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MemoryStore {
        objects: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl MemoryStore {
        fn new() -> Self {
            Self {
                objects: Mutex::new(HashMap::new()),
            }
        }

        fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
            self.objects
                .lock()
                .unwrap()
                .get(&format!("{}/{}", bucket, key))
                .cloned()
        }
    }

    #[async_trait]
    impl ObjectStore for MemoryStore {
        async fn put(&self, bucket: &str, key: &str, data: Vec<u8>) -> StoreResult<String> {
            let reference = format!("{}/{}", bucket, key);
            self.objects
                .lock()
                .unwrap()
                .insert(reference.clone(), data);
            Ok(reference)
        }

        async fn get(&self, bucket: &str, key: &str) -> StoreResult<Vec<u8>> {
            self.object(bucket, key).ok_or_else(|| StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
        }
    }

    struct UnavailableStore;

    #[async_trait]
    impl ObjectStore for UnavailableStore {
        async fn put(&self, _: &str, _: &str, _: Vec<u8>) -> StoreResult<String> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn get(&self, _: &str, _: &str) -> StoreResult<Vec<u8>> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }

    #[derive(Clone, Copy)]
    enum StubBehavior {
        Succeed,
        FailPlan,
    }

    struct StubProvisioner {
        behavior: StubBehavior,
        init_calls: AtomicUsize,
        plan_calls: AtomicUsize,
    }

    impl StubProvisioner {
        fn new(behavior: StubBehavior) -> Self {
            Self {
                behavior,
                init_calls: AtomicUsize::new(0),
                plan_calls: AtomicUsize::new(0),
            }
        }

        fn append(log_path: &Path, line: &str) {
            use std::io::Write;
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path)
                .unwrap();
            writeln!(file, "{}", line).unwrap();
        }
    }

    #[async_trait]
    impl Provisioner for StubProvisioner {
        async fn init(&self, _workdir: &Path, log_path: &Path) -> Result<(), DeployError> {
            self.init_calls.fetch_add(1, Ordering::SeqCst);
            Self::append(log_path, "Initializing the backend...");
            Ok(())
        }

        async fn plan(&self, _workdir: &Path, log_path: &Path) -> Result<(), DeployError> {
            self.plan_calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                StubBehavior::Succeed => {
                    Self::append(log_path, "Plan: 3 to add, 0 to change, 0 to destroy.");
                    Ok(())
                }
                StubBehavior::FailPlan => {
                    Self::append(log_path, "Error: invalid resource reference");
                    Err(DeployError::Subprocess {
                        step: "plan",
                        code: Some(1),
                        log_path: log_path.to_path_buf(),
                    })
                }
            }
        }
    }

    fn shipped_template() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("templates/vsphere_vm.tf.tmpl")
    }

    fn credentials() -> VsphereCredentials {
        VsphereCredentials {
            server: "vcenter.example.com".to_string(),
            user: "svc-deploy".to_string(),
            password: "hunter2".to_string(),
        }
    }

    fn test_job() -> DeploymentJob {
        DeploymentJob {
            id: Uuid::new_v4(),
            name: "batch-1".to_string(),
            vm_name: "web01".to_string(),
            vm_count: 3,
            cpu: 4,
            memory_mb: 4096,
            datacenter_id: 1,
            cluster_id: Some(2),
            network_id: Some(3),
            datastore: "DS1".to_string(),
            blob_reference: None,
            log_excerpt: None,
            status: JobStatus::Running,
            created_at: chrono::Utc::now(),
        }
    }

    fn test_names() -> TargetNames {
        TargetNames {
            datacenter: Some("DC-East".to_string()),
            cluster: Some("Cluster-A".to_string()),
            network: Some("VM Network".to_string()),
        }
    }

    fn pipeline(
        store: Arc<dyn ObjectStore>,
        provisioner: Arc<StubProvisioner>,
    ) -> Pipeline {
        Pipeline::new(
            store,
            provisioner,
            DEFAULT_BUCKET.to_string(),
            shipped_template(),
            credentials(),
        )
    }

    #[tokio::test]
    async fn test_successful_run_persists_artifacts() {
        let store = Arc::new(MemoryStore::new());
        let provisioner = Arc::new(StubProvisioner::new(StubBehavior::Succeed));
        let job = test_job();

        let report = pipeline(store.clone(), provisioner.clone())
            .provision(&job, &test_names())
            .await;

        assert!(report.result.is_ok());
        assert_eq!(
            report.blob_reference.as_deref(),
            Some(format!("{}/job_{}/main.tf", DEFAULT_BUCKET, job.id).as_str())
        );

        let excerpt = report.log_excerpt.unwrap();
        assert!(excerpt.len() <= LOG_EXCERPT_BYTES);
        assert!(excerpt.contains("Plan: 3 to add"));

        // Rendered template and full log both reached the store
        let rendered = store
            .object(DEFAULT_BUCKET, &template_key(job.id))
            .unwrap();
        let rendered = String::from_utf8(rendered).unwrap();
        assert!(rendered.contains("DC-East"));
        assert!(rendered.contains("num_cpus = 4"));
        assert!(rendered.contains("count            = 3"));

        let full_log = store.object(DEFAULT_BUCKET, &log_key(job.id)).unwrap();
        assert!(String::from_utf8(full_log).unwrap().contains("Plan: 3 to add"));

        assert_eq!(provisioner.init_calls.load(Ordering::SeqCst), 1);
        assert_eq!(provisioner.plan_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failing_plan_still_uploads_full_log() {
        let store = Arc::new(MemoryStore::new());
        let provisioner = Arc::new(StubProvisioner::new(StubBehavior::FailPlan));
        let job = test_job();

        let report = pipeline(store.clone(), provisioner.clone())
            .provision(&job, &test_names())
            .await;

        match report.result {
            Err(DeployError::Subprocess { step, code, .. }) => {
                assert_eq!(step, "plan");
                assert_eq!(code, Some(1));
            }
            other => panic!("expected Subprocess error, got {:?}", other),
        }

        // The failing step's output is retrievable in full
        let full_log = store.object(DEFAULT_BUCKET, &log_key(job.id)).unwrap();
        let full_log = String::from_utf8(full_log).unwrap();
        assert!(full_log.contains("Initializing the backend"));
        assert!(full_log.contains("Error: invalid resource reference"));

        assert!(report.blob_reference.is_some());
        assert_eq!(provisioner.init_calls.load(Ordering::SeqCst), 1);
        assert_eq!(provisioner.plan_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_cluster_fails_before_any_subprocess() {
        let store = Arc::new(MemoryStore::new());
        let provisioner = Arc::new(StubProvisioner::new(StubBehavior::Succeed));
        let job = test_job();

        let mut names = test_names();
        names.cluster = None;

        let report = pipeline(store.clone(), provisioner.clone())
            .provision(&job, &names)
            .await;

        match report.result {
            Err(DeployError::Template(TemplateError::MissingField(field))) => {
                assert_eq!(field, "cluster");
            }
            other => panic!("expected Template error, got {:?}", other),
        }

        assert!(report.blob_reference.is_none());
        assert!(report.log_excerpt.is_none());
        assert_eq!(provisioner.init_calls.load(Ordering::SeqCst), 0);
        assert_eq!(provisioner.plan_calls.load(Ordering::SeqCst), 0);
        assert!(store.object(DEFAULT_BUCKET, &template_key(job.id)).is_none());
    }

    #[tokio::test]
    async fn test_store_outage_fails_run_before_subprocess() {
        let provisioner = Arc::new(StubProvisioner::new(StubBehavior::Succeed));
        let job = test_job();

        let pipeline = Pipeline::new(
            Arc::new(UnavailableStore),
            provisioner.clone(),
            DEFAULT_BUCKET.to_string(),
            shipped_template(),
            credentials(),
        );

        let report = pipeline.provision(&job, &test_names()).await;

        assert!(matches!(
            report.result,
            Err(DeployError::Store(StoreError::Unavailable(_)))
        ));
        assert!(report.blob_reference.is_none());
        // Template upload precedes init; nothing was executed
        assert_eq!(provisioner.init_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_truncate_excerpt_law() {
        let long = "x".repeat(LOG_EXCERPT_BYTES + 1000);
        let excerpt = truncate_excerpt(long.as_bytes(), LOG_EXCERPT_BYTES);
        assert_eq!(excerpt, long[..LOG_EXCERPT_BYTES]);

        let short = "terraform plan output";
        assert_eq!(
            truncate_excerpt(short.as_bytes(), LOG_EXCERPT_BYTES),
            short
        );
    }

    #[test]
    fn test_truncate_excerpt_bounds_invalid_utf8() {
        // Every byte expands to a 3-byte replacement char in the excerpt
        let log = vec![0xFF_u8; LOG_EXCERPT_BYTES + 100];

        let excerpt = truncate_excerpt(&log, LOG_EXCERPT_BYTES);
        assert!(excerpt.len() <= LOG_EXCERPT_BYTES);
        assert!(!excerpt.is_empty());
        assert!(excerpt.chars().all(|c| c == char::REPLACEMENT_CHARACTER));
    }

    #[test]
    fn test_truncate_excerpt_respects_utf8_boundary() {
        // 4999 ASCII bytes followed by a 2-byte char straddling the limit
        let mut log = "x".repeat(LOG_EXCERPT_BYTES - 1);
        log.push('é');

        let excerpt = truncate_excerpt(log.as_bytes(), LOG_EXCERPT_BYTES);
        assert_eq!(excerpt, "x".repeat(LOG_EXCERPT_BYTES - 1));
    }
}
