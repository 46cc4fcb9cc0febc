//! Terraform process runner
//!
//! Invokes the provisioning CLI as a subprocess with combined stdout/stderr
//! appended to a per-run log file. Both pipeline steps (`init`, `plan`) run
//! against the same working directory so provider plugins fetched by `init`
//! are visible to `plan`.
//!
//! Each invocation is bounded by a configurable timeout; an expired step
//! kills the process and fails the run. Retry policy, if any, belongs to
//! the orchestrator, not this layer.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::DeployError;

/// Seam for the provisioning tool so the orchestrator can be tested with a
/// call-counting double.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Runs the initialization step in `workdir`, appending output to
    /// `log_path`.
    async fn init(&self, workdir: &Path, log_path: &Path) -> Result<(), DeployError>;

    /// Runs the planning step in `workdir`, appending output to `log_path`.
    async fn plan(&self, workdir: &Path, log_path: &Path) -> Result<(), DeployError>;
}

/// Provisioner backed by the real Terraform binary
pub struct TerraformCli {
    binary: String,
    step_timeout: Duration,
}

impl TerraformCli {
    pub fn new(binary: impl Into<String>, step_timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            step_timeout,
        }
    }

    /// Runs `<binary> <step>` to completion in `workdir`.
    ///
    /// Returns success only on exit code zero. Output (stdout and stderr
    /// combined) is appended to `log_path` so a failing step's output stays
    /// available to the orchestrator.
    async fn run_step(
        &self,
        step: &'static str,
        workdir: &Path,
        log_path: &Path,
    ) -> Result<(), DeployError> {
        debug!("Running {} {} in {}", self.binary, step, workdir.display());

        let log_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;
        let stderr_file = log_file.try_clone()?;

        let mut child = Command::new(&self.binary)
            .arg(step)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log_file))
            .stderr(Stdio::from(stderr_file))
            .spawn()?;

        let status = match tokio::time::timeout(self.step_timeout, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                warn!(
                    "{} {} exceeded timeout of {:?}, killing",
                    self.binary, step, self.step_timeout
                );
                child.kill().await.ok();
                return Err(DeployError::Timeout {
                    step,
                    seconds: self.step_timeout.as_secs(),
                });
            }
        };

        if !status.success() {
            return Err(DeployError::Subprocess {
                step,
                code: status.code(),
                log_path: log_path.to_path_buf(),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl Provisioner for TerraformCli {
    async fn init(&self, workdir: &Path, log_path: &Path) -> Result<(), DeployError> {
        self.run_step("init", workdir, log_path).await
    }

    async fn plan(&self, workdir: &Path, log_path: &Path) -> Result<(), DeployError> {
        self.run_step("plan", workdir, log_path).await
    }
}
