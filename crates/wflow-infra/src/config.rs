//! Engine configuration loader.
//!
//! Reads `wflow.toml` from the root directory and deserializes it into
//! [`EngineConfig`]. Falls back to defaults when the file is missing or
//! malformed.

use std::path::Path;

use wflow_types::config::EngineConfig;

pub const CONFIG_FILE: &str = "wflow.toml";

/// Load configuration from `{root}/wflow.toml`.
///
/// - Missing file: [`EngineConfig::default()`].
/// - Unreadable or unparsable file: a warning, then the default.
pub async fn load_engine_config(root: &Path) -> EngineConfig {
    let config_path = root.join(CONFIG_FILE);

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No {CONFIG_FILE} found at {}, using defaults", config_path.display());
            return EngineConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return EngineConfig::default();
        }
    };

    match toml::from_str::<EngineConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            EngineConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wflow_types::config::DEFAULT_OWNER;

    #[tokio::test]
    async fn missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_engine_config(tmp.path()).await;
        assert_eq!(config.allowed_owners, vec![DEFAULT_OWNER.to_string()]);
        assert_eq!(config.lease_ttl_secs, 300);
    }

    #[tokio::test]
    async fn valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join(CONFIG_FILE),
            r#"
allowed_owners = ["ap-team@example.com", "abc@example.com"]
lease_ttl_secs = 30
definitions_dir = "flows"
"#,
        )
        .await
        .unwrap();

        let config = load_engine_config(tmp.path()).await;
        assert_eq!(config.allowed_owners.len(), 2);
        assert_eq!(config.lease_ttl_secs, 30);
        assert_eq!(config.definitions_dir.as_deref(), Some("flows"));
        assert!(config.database_path.is_none());
    }

    #[tokio::test]
    async fn malformed_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join(CONFIG_FILE), "allowed_owners = [")
            .await
            .unwrap();
        let config = load_engine_config(tmp.path()).await;
        assert_eq!(config.lease_ttl_secs, 300);
    }
}
