//! Repository Module
//!
//! Data access layer for the API server.
//! Each repository handles database operations for a specific entity.

pub mod inventory;
pub mod job;

// Re-export for convenience
pub use inventory as inventory_repository;
pub use job as job_repository;
