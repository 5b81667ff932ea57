//! Shared domain types for wflow.
//!
//! This crate contains the data shapes used across the workflow engine:
//! workflow documents, run statuses, persisted run records, engine
//! configuration, and the repository error type.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod workflow;
