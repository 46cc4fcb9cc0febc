//! Rackforge Blob Store Client
//!
//! A small, type-safe client for the object store that holds rendered
//! Terraform templates and run logs, keyed per deployment job.
//!
//! The store itself is any S3-compatible service (MinIO in the reference
//! deployment). Consumers depend on the [`ObjectStore`] trait so tests can
//! substitute an in-memory double.
//!
//! # Example
//!
//! ```no_run
//! use rackforge_store::{ObjectStore, S3BlobStore, StoreConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), rackforge_store::StoreError> {
//!     let store = S3BlobStore::connect(&StoreConfig::default()).await;
//!     let reference = store
//!         .put("terraform-jobs", "job_x/main.tf", b"provider {}".to_vec())
//!         .await?;
//!     println!("stored at {}", reference);
//!     Ok(())
//! }
//! ```

pub mod error;
mod s3;

pub use error::{Result, StoreError};
pub use s3::S3BlobStore;

use async_trait::async_trait;
use uuid::Uuid;

/// Default bucket for deployment artifacts
pub const DEFAULT_BUCKET: &str = "terraform-jobs";

/// Put/get named byte blobs in named buckets.
///
/// `put` creates the bucket on first use. The returned reference is a stable
/// `bucket/key` string that can be split back into a `get` call later.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores an object, creating the bucket if absent.
    ///
    /// # Returns
    /// The `bucket/key` reference of the stored object.
    async fn put(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<String>;

    /// Fetches an object's bytes.
    ///
    /// Fails with [`StoreError::NotFound`] if the bucket or key does not
    /// exist, or [`StoreError::Unavailable`] on transport failure.
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;
}

/// Object key for a job's rendered Terraform template.
pub fn template_key(job_id: Uuid) -> String {
    format!("job_{}/main.tf", job_id)
}

/// Object key for a job's full run log.
pub fn log_key(job_id: Uuid) -> String {
    format!("job_{}/logs.txt", job_id)
}

/// Stable `bucket/key` reference for a stored object.
pub fn blob_reference(bucket: &str, key: &str) -> String {
    format!("{}/{}", bucket, key)
}

/// Object store connection settings, read from the environment.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Endpoint URL of the S3-compatible service (e.g. "http://localhost:9000")
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

impl StoreConfig {
    /// Reads configuration from `S3_ENDPOINT`, `S3_ACCESS_KEY`,
    /// `S3_SECRET_KEY` and `S3_REGION`.
    pub fn from_env() -> std::result::Result<Self, String> {
        let endpoint = std::env::var("S3_ENDPOINT")
            .map_err(|_| "S3_ENDPOINT environment variable not set".to_string())?;
        let access_key = std::env::var("S3_ACCESS_KEY")
            .map_err(|_| "S3_ACCESS_KEY environment variable not set".to_string())?;
        let secret_key = std::env::var("S3_SECRET_KEY")
            .map_err(|_| "S3_SECRET_KEY environment variable not set".to_string())?;
        let region = std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string());

        Ok(Self {
            endpoint,
            access_key,
            secret_key,
            region,
        })
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9000".to_string(),
            access_key: "minioadmin".to_string(),
            secret_key: "minioadmin".to_string(),
            region: "us-east-1".to_string(),
        }
    }
}
