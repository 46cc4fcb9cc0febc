//! Error types for the blob store client

use thiserror::Error;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur when talking to the object store
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested bucket or object does not exist
    #[error("object {bucket}/{key} not found")]
    NotFound {
        /// Bucket that was queried
        bucket: String,
        /// Object key that was queried
        key: String,
    },

    /// The store could not be reached or rejected the request
    #[error("object store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}
