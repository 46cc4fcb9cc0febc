//! Data Transfer Objects for the HTTP API
//!
//! This module contains DTOs used between API clients and the Rackforge
//! server. DTOs are lightweight representations of domain entities
//! optimized for network transfer.

pub mod job;
