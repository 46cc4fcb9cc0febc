//! Error types for the deployment worker
//!
//! Each pipeline step reports a distinct error kind so the orchestrator can
//! decide the status transition explicitly instead of funnelling everything
//! through one catch-all.

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

use crate::template::TemplateError;

/// Errors that can occur while driving a deployment job
#[derive(Debug, Error)]
pub enum DeployError {
    /// The job id handed to the worker has no matching record
    #[error("deployment job {0} does not exist")]
    JobNotFound(Uuid),

    /// Template could not be loaded or rendered
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Provisioning tool exited non-zero
    #[error("terraform {step} exited with code {code:?}, output captured in {log_path}")]
    Subprocess {
        step: &'static str,
        /// Exit code, absent if the process was killed by a signal
        code: Option<i32>,
        log_path: PathBuf,
    },

    /// Provisioning tool exceeded the configured timeout
    #[error("terraform {step} timed out after {seconds}s")]
    Timeout { step: &'static str, seconds: u64 },

    /// Blob store put/get failure
    #[error(transparent)]
    Store(#[from] rackforge_store::StoreError),

    /// Scratch workspace or log file I/O failure
    #[error("workspace I/O error: {0}")]
    Workspace(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
