//! Engine logic and repository trait definitions for wflow.
//!
//! This crate defines the "ports" (the action and repository traits) that
//! `wflow-actions` and `wflow-infra` implement. It depends only on
//! `wflow-types`, never on `wflow-infra` or any database/IO crate.

pub mod action;
pub mod repository;
pub mod workflow;
