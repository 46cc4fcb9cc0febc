//! Service Module
//!
//! Business logic layer for the API server.
//! Services orchestrate between repositories and contain domain logic.

pub mod deployment;

// Re-export for convenience
pub use deployment as deployment_service;
