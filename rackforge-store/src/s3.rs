//! S3-backed blob store
//!
//! Implements [`ObjectStore`] against any S3-compatible endpoint using
//! path-style addressing and static credentials, which is what MinIO
//! expects. Buckets are created lazily on first `put`; the check-then-create
//! race is acceptable here since buckets are low-cardinality and long-lived.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::{ObjectStore, StoreConfig, blob_reference};

/// Blob store client backed by an S3-compatible service
#[derive(Debug, Clone)]
pub struct S3BlobStore {
    client: Client,
}

impl S3BlobStore {
    /// Builds a client for the configured endpoint.
    ///
    /// The connection is lazy; no request is issued until the first
    /// `put`/`get`.
    pub async fn connect(config: &StoreConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            "rackforge",
        );

        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(config.endpoint.clone())
            .credentials_provider(credentials)
            // MinIO serves buckets under the path, not as subdomains
            .force_path_style(true)
            .build();

        info!("Blob store client configured for {}", config.endpoint);

        Self {
            client: Client::from_conf(s3_config),
        }
    }

    /// Creates the bucket if it does not exist yet.
    async fn ensure_bucket(&self, bucket: &str) -> Result<()> {
        let head = self.client.head_bucket().bucket(bucket).send().await;

        match head {
            Ok(_) => return Ok(()),
            Err(err) => {
                let missing = err
                    .as_service_error()
                    .map(|e| e.is_not_found())
                    .unwrap_or(false);
                if !missing {
                    return Err(StoreError::Unavailable(format!(
                        "head_bucket {} failed: {}",
                        bucket,
                        DisplayErrorContext(&err)
                    )));
                }
            }
        }

        debug!("Creating bucket {}", bucket);

        match self.client.create_bucket().bucket(bucket).send().await {
            Ok(_) => {
                info!("Created bucket {}", bucket);
                Ok(())
            }
            Err(err) => {
                // Another writer may have won the check-then-create race.
                let already_exists = err
                    .as_service_error()
                    .map(|e| {
                        e.is_bucket_already_owned_by_you() || e.is_bucket_already_exists()
                    })
                    .unwrap_or(false);

                if already_exists {
                    Ok(())
                } else {
                    Err(StoreError::Unavailable(format!(
                        "create_bucket {} failed: {}",
                        bucket,
                        DisplayErrorContext(&err)
                    )))
                }
            }
        }
    }
}

#[async_trait]
impl ObjectStore for S3BlobStore {
    async fn put(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<String> {
        debug!("Writing {} bytes to {}/{}", data.len(), bucket, key);

        self.ensure_bucket(bucket).await?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|err| {
                StoreError::Unavailable(format!(
                    "put {}/{} failed: {}",
                    bucket,
                    key,
                    DisplayErrorContext(&err)
                ))
            })?;

        info!("Stored object {}/{}", bucket, key);

        Ok(blob_reference(bucket, key))
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        debug!("Reading {}/{}", bucket, key);

        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                let missing = err
                    .as_service_error()
                    .map(|e| e.is_no_such_key() || e.meta().code() == Some("NoSuchBucket"))
                    .unwrap_or(false);

                if missing {
                    StoreError::NotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    StoreError::Unavailable(format!(
                        "get {}/{} failed: {}",
                        bucket,
                        key,
                        DisplayErrorContext(&err)
                    ))
                }
            })?;

        let body = output.body.collect().await.map_err(|err| {
            StoreError::Unavailable(format!("failed to collect {}/{}: {}", bucket, key, err))
        })?;

        Ok(body.to_vec())
    }
}
