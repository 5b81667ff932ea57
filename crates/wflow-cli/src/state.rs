//! Application state wiring the engine together.
//!
//! AppState holds the concrete instances the commands use. The engine is
//! generic over its repository; AppState pins it to SQLite.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use wflow_actions::builtin_registry;
use wflow_core::action::ActionRegistry;
use wflow_core::workflow::WorkflowEngine;
use wflow_core::workflow::definition::WorkflowDefinition;
use wflow_core::workflow::permission::{AllowListPolicy, OwnerPolicy};
use wflow_infra::config::load_engine_config;
use wflow_infra::definitions::load_named_definition;
use wflow_infra::{DatabasePool, RootLayout, SqliteRunRepository};
use wflow_types::config::EngineConfig;

/// The engine pinned to the SQLite repository.
pub type ConcreteEngine = WorkflowEngine<SqliteRunRepository>;

#[derive(Clone)]
pub struct AppState {
    pub layout: RootLayout,
    pub config: EngineConfig,
    pub repo: Arc<SqliteRunRepository>,
    pub registry: Arc<ActionRegistry>,
    pub owner_policy: Arc<dyn OwnerPolicy>,
}

impl AppState {
    /// Read `wflow.toml`, open the database and build the action registry.
    pub async fn init(root: PathBuf) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&root)
            .await
            .with_context(|| format!("failed to create root directory {}", root.display()))?;

        let config = load_engine_config(&root).await;
        let layout = RootLayout::new(root, &config);

        let db_pool = DatabasePool::open(&layout.database_path)
            .await
            .with_context(|| {
                format!("failed to open database {}", layout.database_path.display())
            })?;

        tracing::debug!(
            root = %layout.root.display(),
            definitions = %layout.definitions_dir.display(),
            "application state ready"
        );

        let repo = Arc::new(SqliteRunRepository::new(db_pool));
        let owner_policy: Arc<dyn OwnerPolicy> =
            Arc::new(AllowListPolicy::new(config.allowed_owners.iter().cloned()));

        Ok(Self {
            layout,
            config,
            repo,
            registry: Arc::new(builtin_registry()),
            owner_policy,
        })
    }

    /// Load a definition by name from the definitions directory, or by path.
    pub async fn load_definition(&self, name_or_path: &str) -> anyhow::Result<WorkflowDefinition> {
        load_named_definition(&self.layout.definitions_dir, name_or_path, &self.registry)
            .await
            .with_context(|| format!("failed to load workflow '{name_or_path}'"))
    }

    pub fn engine(&self, definition: WorkflowDefinition) -> ConcreteEngine {
        WorkflowEngine::new(Arc::new(definition), Arc::clone(&self.repo))
            .with_owner_policy(Arc::clone(&self.owner_policy))
            .with_working_root(self.layout.root.clone())
            .with_lease_ttl(Duration::from_secs(self.config.lease_ttl_secs))
    }
}
