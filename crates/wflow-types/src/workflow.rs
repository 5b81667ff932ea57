//! Workflow domain types for wflow.
//!
//! Two families of types live here:
//!
//! - the declarative workflow document (`WorkflowDocument`, `StepDocument`,
//!   `TransitionDocument`) exactly as it is written in JSON or YAML, before any
//!   validation against the action registry;
//! - execution tracking types (`RunStatus`, `RunRecord`, `StepRunRecord`) that
//!   the engine produces and the persistence layer stores.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Named values flowing through a run (inputs, outputs, parameters, metadata).
pub type Variables = serde_json::Map<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// Transaction identity
// ---------------------------------------------------------------------------

/// Identifier of one run instance of a workflow, spanning every run/resume
/// invocation that touches it. UUIDv7 so that ids sort by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub Uuid);

impl TransactionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TransactionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Run Status
// ---------------------------------------------------------------------------

/// Status carried by every step result and every run record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunStatus {
    Started,
    Completed,
    /// Permission refused by the action.
    Denied,
    /// Step execution conditions were not met.
    Skipped,
    Failed,
    /// Timed out.
    Killed,
    Cancelled,
    /// Suspended until an external resume.
    Waiting,
    Unknown,
}

impl RunStatus {
    /// Cancelled, Failed and Killed end a run unsuccessfully.
    pub fn is_not_successful(self) -> bool {
        matches!(
            self,
            RunStatus::Cancelled | RunStatus::Failed | RunStatus::Killed
        )
    }

    pub fn is_waiting(self) -> bool {
        self == RunStatus::Waiting
    }

    /// Statuses after which the engine consults the transitions.
    pub fn is_forward_progress(self) -> bool {
        !self.is_not_successful() && !self.is_waiting()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Started => "Started",
            RunStatus::Completed => "Completed",
            RunStatus::Denied => "Denied",
            RunStatus::Skipped => "Skipped",
            RunStatus::Failed => "Failed",
            RunStatus::Killed => "Killed",
            RunStatus::Cancelled => "Cancelled",
            RunStatus::Waiting => "Waiting",
            RunStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "started" => Ok(RunStatus::Started),
            "completed" => Ok(RunStatus::Completed),
            "denied" => Ok(RunStatus::Denied),
            "skipped" => Ok(RunStatus::Skipped),
            "failed" => Ok(RunStatus::Failed),
            "killed" => Ok(RunStatus::Killed),
            "cancelled" => Ok(RunStatus::Cancelled),
            "waiting" => Ok(RunStatus::Waiting),
            "unknown" => Ok(RunStatus::Unknown),
            other => Err(format!("invalid run status: '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Workflow Document
// ---------------------------------------------------------------------------

/// A workflow as written on disk. Validated into an executable definition by
/// `wflow-core`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDocument {
    pub name: String,
    #[serde(default)]
    pub desc: String,
    /// Static parameters visible to every step.
    #[serde(default)]
    pub parameters: Variables,
    pub first_step: String,
    #[serde(default)]
    pub steps: Vec<StepDocument>,
    #[serde(default)]
    pub transitions: Vec<TransitionDocument>,
}

/// A single step node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDocument {
    /// Unique within the workflow. Optional here so a missing id can be
    /// reported as a definition error instead of a parse error.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub desc: String,
    /// Registered action name.
    pub action: String,
    #[serde(default)]
    pub parameters: Variables,
    /// Gating condition templates. A single string is accepted.
    #[serde(default, deserialize_with = "one_or_many")]
    pub exec_if: Vec<String>,
    /// Action input name -> context variable name.
    #[serde(default)]
    pub input_mapping: BTreeMap<String, String>,
    /// Action output name -> context variable name.
    #[serde(default)]
    pub output_mapping: BTreeMap<String, String>,
}

/// A directed, optionally conditional edge between two steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionDocument {
    pub from_step: String,
    pub to_step: String,
    #[serde(default, deserialize_with = "one_or_many")]
    pub conditions: Vec<String>,
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
    })
}

// ---------------------------------------------------------------------------
// Persisted records
// ---------------------------------------------------------------------------

/// One row per transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub transaction_id: TransactionId,
    pub workflow_name: String,
    /// Working-directory token handed to actions and conditions.
    pub working_dir: String,
    pub owner: String,
    /// Run metadata supplied by the caller at `run` time.
    #[serde(default)]
    pub metadata: Variables,
    /// Live variable set at the time of the last write.
    #[serde(default)]
    pub context: Variables,
    pub status: RunStatus,
    pub reason: String,
    /// Step the run stopped at. Set while the run is in progress or waiting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One row per (transaction, step). Re-entering a step on resume updates the
/// existing row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRunRecord {
    pub transaction_id: TransactionId,
    pub step_id: String,
    pub action: String,
    #[serde(default)]
    pub input: Variables,
    #[serde(default)]
    pub output: Variables,
    pub status: RunStatus,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_not_successful_classification() {
        assert!(RunStatus::Failed.is_not_successful());
        assert!(RunStatus::Killed.is_not_successful());
        assert!(RunStatus::Cancelled.is_not_successful());
        assert!(!RunStatus::Denied.is_not_successful());
        assert!(!RunStatus::Waiting.is_not_successful());
        assert!(RunStatus::Waiting.is_waiting());
        assert!(RunStatus::Skipped.is_forward_progress());
        assert!(RunStatus::Denied.is_forward_progress());
        assert!(!RunStatus::Waiting.is_forward_progress());
    }

    #[test]
    fn test_run_status_display_and_parse() {
        assert_eq!(RunStatus::Waiting.to_string(), "Waiting");
        assert_eq!("completed".parse::<RunStatus>().unwrap(), RunStatus::Completed);
        assert_eq!("Cancelled".parse::<RunStatus>().unwrap(), RunStatus::Cancelled);
        let err = "paused".parse::<RunStatus>().unwrap_err();
        assert!(err.contains("paused"), "got: {err}");
    }

    #[test]
    fn test_run_status_serializes_as_variant_name() {
        let json = serde_json::to_string(&RunStatus::Skipped).unwrap();
        assert_eq!(json, "\"Skipped\"");
    }

    #[test]
    fn test_document_accepts_single_or_list_conditions() {
        let doc: WorkflowDocument = serde_json::from_value(json!({
            "name": "ap",
            "first_step": "a",
            "steps": [
                {"id": "a", "action": "delay", "exec_if": "{x} > 1"},
                {"id": "b", "action": "delay", "exec_if": ["{x} > 1", "{y}"]},
                {"id": "c", "action": "delay"}
            ],
            "transitions": [
                {"from_step": "a", "to_step": "b", "conditions": "{ok}"},
                {"from_step": "b", "to_step": "c"}
            ]
        }))
        .unwrap();

        assert_eq!(doc.steps[0].exec_if, vec!["{x} > 1"]);
        assert_eq!(doc.steps[1].exec_if.len(), 2);
        assert!(doc.steps[2].exec_if.is_empty());
        assert_eq!(doc.transitions[0].conditions, vec!["{ok}"]);
        assert!(doc.transitions[1].conditions.is_empty());
        assert_eq!(doc.desc, "");
    }

    #[test]
    fn test_step_without_id_still_parses() {
        let doc: WorkflowDocument = serde_json::from_value(json!({
            "name": "x",
            "first_step": "a",
            "steps": [{"action": "delay"}]
        }))
        .unwrap();
        assert!(doc.steps[0].id.is_none());
    }

    #[test]
    fn test_document_from_yaml() {
        let yaml = r#"
name: invoice
desc: Process an invoice
parameters:
  document_type: INVOICE
first_step: extract
steps:
  - id: extract
    action: extract_document
    output_mapping:
      data: invoice_data
transitions: []
"#;
        let doc: WorkflowDocument = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(doc.parameters["document_type"], json!("INVOICE"));
        assert_eq!(doc.steps[0].output_mapping["data"], "invoice_data");
    }

    #[test]
    fn test_transaction_id_parse() {
        let id = TransactionId::new();
        let parsed: TransactionId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("last".parse::<TransactionId>().is_err());
    }
}
