//! Rackforge Core
//!
//! Core types and abstractions for the Rackforge deployment pipeline.
//!
//! This crate contains:
//! - Domain types: Core business entities (DeploymentJob, JobStatus)
//! - DTOs: Data transfer objects for the HTTP API

pub mod domain;
pub mod dto;
