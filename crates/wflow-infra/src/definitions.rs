//! Workflow definition files.
//!
//! Definitions live in `{root}/definitions` as `{name}.json`, `{name}.yaml` or
//! `{name}.yml`. Loading parses the document and validates it against the
//! action registry.

use std::path::{Path, PathBuf};

use wflow_core::action::ActionRegistry;
use wflow_core::workflow::definition::{
    DefinitionError, WorkflowDefinition, parse_workflow_json, parse_workflow_yaml,
};

const EXTENSIONS: [&str; 3] = ["json", "yaml", "yml"];

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum DefinitionLoadError {
    #[error("workflow definition '{name}' not found in {dir}")]
    NotFound { name: String, dir: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported definition format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid definition {path}: {source}")]
    Invalid {
        path: String,
        #[source]
        source: DefinitionError,
    },
}

// ---------------------------------------------------------------------------
// Format
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionFormat {
    Json,
    Yaml,
}

impl DefinitionFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }
}

/// A definition file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionEntry {
    /// File stem, the name `run` and `resume` look definitions up by.
    pub name: String,
    pub path: PathBuf,
    pub format: DefinitionFormat,
}

// ---------------------------------------------------------------------------
// Lookup and loading
// ---------------------------------------------------------------------------

/// Resolve a workflow name, or a path to a definition file, to a file.
///
/// A name is tried with each extension in turn, JSON first.
pub fn locate_definition(dir: &Path, name_or_path: &str) -> Result<PathBuf, DefinitionLoadError> {
    let direct = Path::new(name_or_path);
    if DefinitionFormat::from_path(direct).is_some() && direct.is_file() {
        return Ok(direct.to_path_buf());
    }

    EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{name_or_path}.{ext}")))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| DefinitionLoadError::NotFound {
            name: name_or_path.to_string(),
            dir: dir.display().to_string(),
        })
}

/// Read and validate one definition file.
pub async fn load_definition(
    path: &Path,
    registry: &ActionRegistry,
) -> Result<WorkflowDefinition, DefinitionLoadError> {
    let format = DefinitionFormat::from_path(path)
        .ok_or_else(|| DefinitionLoadError::UnsupportedFormat(path.display().to_string()))?;

    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| DefinitionLoadError::Io {
            path: path.display().to_string(),
            source,
        })?;

    let parsed = match format {
        DefinitionFormat::Json => parse_workflow_json(&content, registry),
        DefinitionFormat::Yaml => parse_workflow_yaml(&content, registry),
    };
    let definition = parsed.map_err(|source| DefinitionLoadError::Invalid {
        path: path.display().to_string(),
        source,
    })?;

    tracing::info!(
        workflow = %definition.name,
        path = %path.display(),
        "loaded workflow definition"
    );
    Ok(definition)
}

/// [`locate_definition`] followed by [`load_definition`].
pub async fn load_named_definition(
    dir: &Path,
    name_or_path: &str,
    registry: &ActionRegistry,
) -> Result<WorkflowDefinition, DefinitionLoadError> {
    let path = locate_definition(dir, name_or_path)?;
    load_definition(&path, registry).await
}

/// Every definition file in `dir`, sorted by name. A missing directory
/// yields an empty list.
pub async fn discover_definitions(dir: &Path) -> Result<Vec<DefinitionEntry>, DefinitionLoadError> {
    let io_err = |source| DefinitionLoadError::Io {
        path: dir.display().to_string(),
        source,
    };

    let mut read_dir = match tokio::fs::read_dir(dir).await {
        Ok(read_dir) => read_dir,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(dir = %dir.display(), "definitions directory does not exist");
            return Ok(Vec::new());
        }
        Err(err) => return Err(io_err(err)),
    };

    let mut entries = Vec::new();
    while let Some(entry) = read_dir.next_entry().await.map_err(io_err)? {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(format) = DefinitionFormat::from_path(&path) else {
            continue;
        };
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        entries.push(DefinitionEntry {
            name: name.to_string(),
            path: path.clone(),
            format,
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.path.cmp(&b.path)));
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wflow_core::action::{Action, ActionError, ActionOutcome, BoxAction, InputSpec};
    use wflow_types::workflow::Variables;

    struct Noop;

    impl Action for Noop {
        fn name(&self) -> &str {
            "noop"
        }
        fn required_inputs(&self) -> Vec<InputSpec> {
            Vec::new()
        }
        fn produced_outputs(&self) -> Vec<String> {
            Vec::new()
        }
        async fn run(&self, _inputs: &Variables) -> Result<ActionOutcome, ActionError> {
            Ok(ActionOutcome::completed())
        }
    }

    fn registry() -> ActionRegistry {
        let mut registry = ActionRegistry::new();
        registry.register("noop", "No-op", || BoxAction::new(Noop));
        registry
    }

    const JSON_DOC: &str = r#"{
        "name": "hello",
        "first_step": "one",
        "steps": [{"id": "one", "action": "noop"}],
        "transitions": []
    }"#;

    const YAML_DOC: &str = "
name: hello-yaml
first_step: one
steps:
  - id: one
    action: noop
  - id: two
    action: noop
transitions:
  - from_step: one
    to_step: two
";

    async fn write(dir: &Path, file: &str, content: &str) {
        tokio::fs::write(dir.join(file), content).await.unwrap();
    }

    #[tokio::test]
    async fn load_json_and_yaml_by_name() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "hello.json", JSON_DOC).await;
        write(tmp.path(), "other.yml", YAML_DOC).await;

        let json = load_named_definition(tmp.path(), "hello", &registry()).await.unwrap();
        assert_eq!(json.name, "hello");

        let yaml = load_named_definition(tmp.path(), "other", &registry()).await.unwrap();
        assert_eq!(yaml.name, "hello-yaml");
        assert_eq!(yaml.transitions().len(), 1);
    }

    #[tokio::test]
    async fn load_by_explicit_path() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "elsewhere.yaml", YAML_DOC).await;
        let path = tmp.path().join("elsewhere.yaml");

        let def = load_named_definition(Path::new("/nonexistent"), path.to_str().unwrap(), &registry())
            .await
            .unwrap();
        assert_eq!(def.name, "hello-yaml");
    }

    #[tokio::test]
    async fn missing_definition_reports_directory() {
        let tmp = TempDir::new().unwrap();
        let err = load_named_definition(tmp.path(), "ghost", &registry())
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("'ghost'"), "got: {msg}");
        assert!(matches!(err, DefinitionLoadError::NotFound { .. }));
    }

    #[tokio::test]
    async fn invalid_definition_names_file() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "bad.json",
            r#"{"name": "bad", "first_step": "one", "steps": [{"id": "one", "action": "teleport"}]}"#,
        )
        .await;

        let err = load_named_definition(tmp.path(), "bad", &registry())
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("bad.json"), "got: {msg}");
        assert!(msg.contains("teleport"), "got: {msg}");
    }

    #[tokio::test]
    async fn discover_lists_supported_files_sorted() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "zeta.json", JSON_DOC).await;
        write(tmp.path(), "alpha.yaml", YAML_DOC).await;
        write(tmp.path(), "README.md", "not a workflow").await;

        let found = discover_definitions(tmp.path()).await.unwrap();
        let names: Vec<&str> = found.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert_eq!(found[0].format, DefinitionFormat::Yaml);
        assert_eq!(found[1].format, DefinitionFormat::Json);
    }

    #[tokio::test]
    async fn discover_missing_directory_is_empty() {
        let tmp = TempDir::new().unwrap();
        let found = discover_definitions(&tmp.path().join("nope")).await.unwrap();
        assert!(found.is_empty());
    }
}
