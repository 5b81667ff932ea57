//! Root directory layout.
//!
//! Everything wflow touches on disk lives under one root directory:
//!
//! ```text
//! {root}/wflow.toml
//! {root}/definitions/{name}.json|yaml|yml
//! {root}/data/wf.sqlite3
//! {root}/workflows/{transaction_id}/
//! ```

use std::path::{Path, PathBuf};

use wflow_types::config::EngineConfig;

use crate::sqlite::pool::DATABASE_FILE;

/// Environment variable naming the root directory.
pub const ROOT_DIR_ENV: &str = "WFLOW_ROOT_DIR";

/// `WFLOW_ROOT_DIR`, falling back to the current working directory.
pub fn resolve_root_dir() -> std::io::Result<PathBuf> {
    match std::env::var_os(ROOT_DIR_ENV) {
        Some(dir) if !dir.is_empty() => Ok(PathBuf::from(dir)),
        _ => std::env::current_dir(),
    }
}

/// Resolved paths for one root directory, with config overrides applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootLayout {
    pub root: PathBuf,
    pub definitions_dir: PathBuf,
    pub database_path: PathBuf,
}

impl RootLayout {
    pub fn new(root: impl Into<PathBuf>, config: &EngineConfig) -> Self {
        let root = root.into();
        let definitions_dir = resolve_under(&root, config.definitions_dir.as_deref(), "definitions");
        let database_path = resolve_under(&root, config.database_path.as_deref(), DATABASE_FILE);
        Self {
            root,
            definitions_dir,
            database_path,
        }
    }

    /// Parent of every per-transaction working directory.
    pub fn workflows_dir(&self) -> PathBuf {
        self.root.join("workflows")
    }
}

/// Relative overrides resolve against the root; absolute ones are kept.
fn resolve_under(root: &Path, configured: Option<&str>, default: &str) -> PathBuf {
    match configured {
        Some(path) if Path::new(path).is_absolute() => PathBuf::from(path),
        Some(path) => root.join(path),
        None => root.join(default),
    }
}
