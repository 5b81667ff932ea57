//! Infrastructure layer for wflow.
//!
//! Implements the `RunRepository` trait from `wflow-core` on SQLite, and
//! provides the filesystem side of the engine: root directory layout,
//! `wflow.toml` loading and workflow definition discovery.

pub mod config;
pub mod definitions;
pub mod filesystem;
pub mod sqlite;

pub use definitions::{DefinitionEntry, DefinitionFormat, DefinitionLoadError};
pub use filesystem::{RootLayout, resolve_root_dir};
pub use sqlite::pool::DatabasePool;
pub use sqlite::run::SqliteRunRepository;
