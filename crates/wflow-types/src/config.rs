//! Engine configuration types.
//!
//! `EngineConfig` represents the optional `wflow.toml` at the root directory
//! and controls who may start runs, how long a resume lease lasts, and where
//! definitions and the database live.

use serde::{Deserialize, Serialize};

/// Owner allowed when no configuration says otherwise.
pub const DEFAULT_OWNER: &str = "abc@example.com";

/// Top-level configuration for the engine.
///
/// Loaded from `{root}/wflow.toml`. All fields have defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Owners permitted to invoke workflows. Empty means everyone.
    #[serde(default = "default_allowed_owners")]
    pub allowed_owners: Vec<String>,

    /// How long a resume holds its per-transaction lease, in seconds.
    #[serde(default = "default_lease_ttl_secs")]
    pub lease_ttl_secs: u64,

    /// Override for `{root}/definitions`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definitions_dir: Option<String>,

    /// Override for `{root}/data/wf.sqlite3`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<String>,
}

fn default_allowed_owners() -> Vec<String> {
    vec![DEFAULT_OWNER.to_string()]
}

fn default_lease_ttl_secs() -> u64 {
    300
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            allowed_owners: default_allowed_owners(),
            lease_ttl_secs: default_lease_ttl_secs(),
            definitions_dir: None,
            database_path: None,
        }
    }
}
