//! Execution context for a single transaction.
//!
//! `ExecutionContext` is the state the engine carries from step to step:
//! workflow parameters, run metadata, owner, working-directory token and the
//! live variable set. Only the engine mutates it, by merging each step's
//! mapped outputs once the step has finished.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use wflow_types::workflow::Variables;

use super::definition::StepDefinition;

// ---------------------------------------------------------------------------
// Reserved names
// ---------------------------------------------------------------------------

pub const OWNER_KEY: &str = "owner";
pub const STEP_NAME_KEY: &str = "step_name";
pub const WORKING_DIR_KEY: &str = "working_dir";

// ---------------------------------------------------------------------------
// ExecutionContext
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Workflow static parameters.
    pub parameters: Variables,
    pub metadata: Variables,
    pub owner: String,
    pub working_dir: String,
    /// Caller inputs plus every output merged so far.
    pub variables: Variables,
}

impl ExecutionContext {
    pub fn new(
        parameters: Variables,
        metadata: Variables,
        owner: impl Into<String>,
        working_dir: impl Into<String>,
        variables: Variables,
    ) -> Self {
        Self {
            parameters,
            metadata,
            owner: owner.into(),
            working_dir: working_dir.into(),
            variables,
        }
    }

    /// Overlay caller-supplied values on the live variables.
    pub fn merge_variables(&mut self, extra: Variables) {
        self.variables.extend(extra);
    }

    /// Merge a finished step's (already mapped) outputs.
    pub fn merge_outputs(&mut self, outputs: &Variables) {
        for (key, value) in outputs {
            self.variables.insert(key.clone(), value.clone());
        }
    }

    /// Required keys absent from the live variables, sorted.
    pub fn missing_inputs(&self, required: &BTreeSet<String>) -> Vec<String> {
        required
            .iter()
            .filter(|key| !self.variables.contains_key(key.as_str()))
            .cloned()
            .collect()
    }

    /// Flattened scope for condition evaluation.
    ///
    /// Later layers win: workflow parameters, step parameters, metadata,
    /// variables, then the reserved `owner`, `step_name` and `working_dir`.
    pub fn condition_scope(&self, step_id: &str, step_parameters: &Variables) -> Variables {
        let mut scope = Variables::new();
        extend(&mut scope, &self.parameters);
        extend(&mut scope, step_parameters);
        extend(&mut scope, &self.metadata);
        extend(&mut scope, &self.variables);
        scope.insert(OWNER_KEY.into(), Value::String(self.owner.clone()));
        scope.insert(STEP_NAME_KEY.into(), Value::String(step_id.to_string()));
        scope.insert(
            WORKING_DIR_KEY.into(),
            Value::String(self.working_dir.clone()),
        );
        scope
    }

    /// Inputs handed to a step's action.
    ///
    /// Later layers win: workflow parameters, step parameters, metadata,
    /// variables renamed through the step's input mapping, then `owner`.
    pub fn action_inputs(&self, step: &StepDefinition) -> Variables {
        let mut inputs = Variables::new();
        extend(&mut inputs, &self.parameters);
        extend(&mut inputs, step.parameters());
        extend(&mut inputs, &self.metadata);
        inputs.extend(step.map_inputs(&self.variables));
        inputs.insert(OWNER_KEY.into(), Value::String(self.owner.clone()));
        inputs
    }
}

fn extend(target: &mut Variables, layer: &Variables) {
    for (key, value) in layer {
        target.insert(key.clone(), value.clone());
    }
}
