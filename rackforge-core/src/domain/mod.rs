//! Core domain types
//!
//! This module contains the core domain structures used across Rackforge
//! services. These types represent deployment jobs and are shared between
//! the API server (for persistence) and the worker (for execution).

pub mod job;
