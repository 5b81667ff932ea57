//! Action capability contract.
//!
//! Every step in a workflow is bound to an action. The engine only ever talks
//! to actions through [`Action`] (or its type-erased form [`BoxAction`]);
//! concrete implementations live outside this crate and are made available
//! through an [`ActionRegistry`].
//!
//! Business failures are reported through [`ActionOutcome::status`]. An
//! [`ActionError`] is reserved for contract violations such as malformed
//! inputs or calling `resume` on an action that cannot suspend.

pub mod box_action;
pub mod registry;

use serde_json::Value;
use wflow_types::workflow::{RunStatus, Variables};

pub use box_action::{ActionDyn, BoxAction};
pub use registry::{ActionFactory, ActionRegistry, RegisteredAction};

// ---------------------------------------------------------------------------
// Contract types
// ---------------------------------------------------------------------------

/// A named input an action expects, with a human-readable label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSpec {
    pub name: String,
    pub label: String,
}

impl InputSpec {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
        }
    }
}

/// What an action hands back from `run` or `resume`.
///
/// `outputs` may contain more keys than the action declares; everything is
/// merged into the run context after output mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    pub outputs: Variables,
    pub status: RunStatus,
    pub reason: Option<String>,
}

impl ActionOutcome {
    pub fn new(status: RunStatus) -> Self {
        Self {
            outputs: Variables::new(),
            status,
            reason: None,
        }
    }

    pub fn completed() -> Self {
        Self::new(RunStatus::Completed)
    }

    pub fn waiting(reason: impl Into<String>) -> Self {
        Self::new(RunStatus::Waiting).with_reason(reason)
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self::new(RunStatus::Failed).with_reason(reason)
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_output(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.outputs.insert(key.into(), value.into());
        self
    }
}

/// Contract violations raised by an action.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("action '{action}' does not support {operation}")]
    UnsupportedOperation {
        action: String,
        operation: &'static str,
    },

    #[error("invalid input '{key}': {message}")]
    InvalidInput { key: String, message: String },
}

impl ActionError {
    pub fn invalid_input(key: impl Into<String>, message: impl Into<String>) -> Self {
        ActionError::InvalidInput {
            key: key.into(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Action trait
// ---------------------------------------------------------------------------

/// A pluggable step handler.
///
/// Uses native async fn in traits (RPITIT). For runtime selection by name use
/// [`BoxAction`], which wraps any `Action` behind dynamic dispatch.
///
/// Instances are created fresh for every step invocation and must not keep
/// run state between calls.
pub trait Action: Send + Sync {
    /// Registered name of this action.
    fn name(&self) -> &str;

    /// Inputs the action needs. Step parameters with the same name satisfy them.
    fn required_inputs(&self) -> Vec<InputSpec>;

    /// Output names the action declares.
    fn produced_outputs(&self) -> Vec<String>;

    fn run(
        &self,
        inputs: &Variables,
    ) -> impl std::future::Future<Output = Result<ActionOutcome, ActionError>> + Send;

    /// Continue after a previous `run` returned `Waiting`.
    ///
    /// Only actions that can suspend override this.
    fn resume(
        &self,
        inputs: &Variables,
    ) -> impl std::future::Future<Output = Result<ActionOutcome, ActionError>> + Send {
        let _ = inputs;
        let action = self.name().to_string();
        async move {
            Err(ActionError::UnsupportedOperation {
                action,
                operation: "resume",
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Input helpers
// ---------------------------------------------------------------------------

/// Fetch a required string input.
pub fn require_str<'a>(inputs: &'a Variables, key: &str) -> Result<&'a str, ActionError> {
    match inputs.get(key) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(ActionError::invalid_input(
            key,
            format!("expected a string, got {other}"),
        )),
        None => Err(ActionError::invalid_input(key, "missing")),
    }
}

/// Fetch an optional list of strings. A single string is treated as a
/// one-element list.
pub fn optional_str_list(inputs: &Variables, key: &str) -> Result<Vec<String>, ActionError> {
    match inputs.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(vec![s.clone()]),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(ActionError::invalid_input(
                    key,
                    format!("expected a list of strings, found {other}"),
                )),
            })
            .collect(),
        Some(other) => Err(ActionError::invalid_input(
            key,
            format!("expected a list of strings, got {other}"),
        )),
    }
}
