//! Workflow definition model.
//!
//! Turns a [`WorkflowDocument`] into an executable [`WorkflowDefinition`]:
//! steps are bound to registered actions, condition templates are parsed,
//! and input/output key mappings and derived key sets are computed once.
//! A document either loads completely or not at all.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use thiserror::Error;
use wflow_types::workflow::{StepDocument, Variables, WorkflowDocument};

use super::condition::{Condition, EvaluationError};
use super::context::ExecutionContext;
use crate::action::{ActionFactory, ActionRegistry, BoxAction};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Malformed or inconsistent workflow document.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("step #{index} has no id")]
    MissingStepId { index: usize },

    #[error("duplicate step id: '{0}'")]
    DuplicateStep(String),

    #[error("step '{step}' uses unknown action '{action}'")]
    UnknownAction { step: String, action: String },

    #[error("first step '{0}' is not defined")]
    MissingFirstStep(String),

    #[error("transition from '{0}' to itself is not allowed")]
    SelfTransition(String),

    #[error("transition {from} -> {to} references unknown step '{missing}'")]
    UnknownTransitionStep {
        from: String,
        to: String,
        missing: String,
    },

    #[error("invalid condition in {location}: {source}")]
    InvalidCondition {
        location: String,
        #[source]
        source: EvaluationError,
    },
}

// ---------------------------------------------------------------------------
// StepDefinition
// ---------------------------------------------------------------------------

/// A validated step bound to an action factory.
#[derive(Clone)]
pub struct StepDefinition {
    pub id: String,
    pub desc: String,
    pub action_name: String,
    action: ActionFactory,
    parameters: Variables,
    exec_if: Vec<Condition>,
    required_inputs: BTreeSet<String>,
    produced_outputs: BTreeSet<String>,
    /// context variable -> action input
    reverse_input_mapping: BTreeMap<String, String>,
    /// action output -> context variable
    output_mapping: BTreeMap<String, String>,
}

impl std::fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepDefinition")
            .field("id", &self.id)
            .field("action", &self.action_name)
            .field("required_inputs", &self.required_inputs)
            .field("produced_outputs", &self.produced_outputs)
            .finish_non_exhaustive()
    }
}

impl StepDefinition {
    fn from_document(
        index: usize,
        doc: &StepDocument,
        registry: &ActionRegistry,
    ) -> Result<Self, DefinitionError> {
        let id = doc
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(DefinitionError::MissingStepId { index })?
            .to_string();

        let registered = registry
            .get(&doc.action)
            .ok_or_else(|| DefinitionError::UnknownAction {
                step: id.clone(),
                action: doc.action.clone(),
            })?;
        let sample = registered.create();

        let exec_if = doc
            .exec_if
            .iter()
            .map(|template| {
                Condition::parse(template.as_str()).map_err(|source| {
                    DefinitionError::InvalidCondition {
                        location: format!("exec_if of step '{id}'"),
                        source,
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let required_inputs = sample
            .required_inputs()
            .into_iter()
            .filter(|spec| !doc.parameters.contains_key(&spec.name))
            .map(|spec| rename(&doc.input_mapping, spec.name))
            .collect();

        let produced_outputs = sample
            .produced_outputs()
            .into_iter()
            .map(|name| rename(&doc.output_mapping, name))
            .collect();

        let reverse_input_mapping = doc
            .input_mapping
            .iter()
            .map(|(action_key, context_key)| (context_key.clone(), action_key.clone()))
            .collect();

        Ok(Self {
            id,
            desc: doc.desc.clone(),
            action_name: doc.action.clone(),
            action: registered.factory(),
            parameters: doc.parameters.clone(),
            exec_if,
            required_inputs,
            produced_outputs,
            reverse_input_mapping,
            output_mapping: doc.output_mapping.clone(),
        })
    }

    /// A fresh action instance for one invocation.
    pub fn instantiate(&self) -> BoxAction {
        (self.action)()
    }

    pub fn parameters(&self) -> &Variables {
        &self.parameters
    }

    pub fn exec_if(&self) -> &[Condition] {
        &self.exec_if
    }

    /// Context variables this step needs, after input mapping.
    pub fn required_inputs(&self) -> &BTreeSet<String> {
        &self.required_inputs
    }

    /// Context variables this step produces, after output mapping.
    pub fn produced_outputs(&self) -> &BTreeSet<String> {
        &self.produced_outputs
    }

    /// Rename context variables to the names the action expects.
    pub fn map_inputs(&self, variables: &Variables) -> Variables {
        variables
            .iter()
            .map(|(key, value)| {
                let key = self.reverse_input_mapping.get(key).unwrap_or(key);
                (key.clone(), value.clone())
            })
            .collect()
    }

    /// Rename action outputs to context variable names.
    pub fn map_outputs(&self, outputs: Variables) -> Variables {
        outputs
            .into_iter()
            .map(|(key, value)| (rename(&self.output_mapping, key), value))
            .collect()
    }
}

fn rename(mapping: &BTreeMap<String, String>, key: String) -> String {
    mapping.get(&key).cloned().unwrap_or(key)
}

// ---------------------------------------------------------------------------
// TransitionDefinition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TransitionDefinition {
    pub from_step: String,
    pub to_step: String,
    pub conditions: Vec<Condition>,
}

// ---------------------------------------------------------------------------
// WorkflowDefinition
// ---------------------------------------------------------------------------

/// An executable workflow. Loaded once and shared read-only.
#[derive(Debug, Clone)]
pub struct WorkflowDefinition {
    pub name: String,
    pub desc: String,
    pub parameters: Variables,
    first_step: String,
    steps: Vec<StepDefinition>,
    index: HashMap<String, usize>,
    transitions: Vec<TransitionDefinition>,
    required_inputs: BTreeSet<String>,
}

impl WorkflowDefinition {
    /// Validate a document against the registry.
    ///
    /// Checks, in order:
    /// - every step has an id, a known action and well-formed `exec_if` templates
    /// - step ids are unique
    /// - the first step exists
    /// - transitions are not self-loops, reference known steps and carry
    ///   well-formed condition templates
    pub fn from_document(
        doc: WorkflowDocument,
        registry: &ActionRegistry,
    ) -> Result<Self, DefinitionError> {
        let mut steps = Vec::with_capacity(doc.steps.len());
        let mut index = HashMap::with_capacity(doc.steps.len());

        for (i, step_doc) in doc.steps.iter().enumerate() {
            let step = StepDefinition::from_document(i, step_doc, registry)?;
            if index.insert(step.id.clone(), steps.len()).is_some() {
                return Err(DefinitionError::DuplicateStep(step.id));
            }
            steps.push(step);
        }

        if !index.contains_key(&doc.first_step) {
            return Err(DefinitionError::MissingFirstStep(doc.first_step));
        }

        let mut transitions = Vec::with_capacity(doc.transitions.len());
        for t in &doc.transitions {
            if t.from_step == t.to_step {
                return Err(DefinitionError::SelfTransition(t.from_step.clone()));
            }
            for endpoint in [&t.from_step, &t.to_step] {
                if !index.contains_key(endpoint) {
                    return Err(DefinitionError::UnknownTransitionStep {
                        from: t.from_step.clone(),
                        to: t.to_step.clone(),
                        missing: endpoint.clone(),
                    });
                }
            }
            let conditions = t
                .conditions
                .iter()
                .map(|template| {
                    Condition::parse(template.as_str()).map_err(|source| {
                        DefinitionError::InvalidCondition {
                            location: format!("transition {} -> {}", t.from_step, t.to_step),
                            source,
                        }
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            transitions.push(TransitionDefinition {
                from_step: t.from_step.clone(),
                to_step: t.to_step.clone(),
                conditions,
            });
        }

        let required_inputs = derive_required_inputs(&steps, &doc.parameters);

        tracing::debug!(
            workflow = %doc.name,
            steps = steps.len(),
            transitions = transitions.len(),
            required_inputs = ?required_inputs,
            "loaded workflow definition"
        );

        Ok(Self {
            name: doc.name,
            desc: doc.desc,
            parameters: doc.parameters,
            first_step: doc.first_step,
            steps,
            index,
            transitions,
            required_inputs,
        })
    }

    pub fn first_step(&self) -> &StepDefinition {
        // from_document guarantees the first step is indexed
        &self.steps[self.index[&self.first_step]]
    }

    pub fn step(&self, id: &str) -> Option<&StepDefinition> {
        self.index.get(id).map(|&i| &self.steps[i])
    }

    /// Steps in document order.
    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    pub fn transitions(&self) -> &[TransitionDefinition] {
        &self.transitions
    }

    /// Keys a caller must supply: what steps need, minus what steps produce,
    /// minus workflow parameters.
    pub fn required_inputs(&self) -> &BTreeSet<String> {
        &self.required_inputs
    }

    /// Select the step that follows `current`.
    ///
    /// Transitions leaving `current` are tried in document order; the first
    /// one with no conditions, or with every condition true, wins. `Ok(None)`
    /// means the workflow has reached its end. Conditions see the scope of
    /// `current`.
    pub fn next_step(
        &self,
        current: &StepDefinition,
        ctx: &ExecutionContext,
    ) -> Result<Option<&StepDefinition>, EvaluationError> {
        let scope = ctx.condition_scope(&current.id, current.parameters());
        for transition in self.transitions.iter().filter(|t| t.from_step == current.id) {
            let mut matched = true;
            for condition in &transition.conditions {
                if !condition.evaluate(&scope)? {
                    matched = false;
                    break;
                }
            }
            if matched {
                return Ok(self.step(&transition.to_step));
            }
        }
        Ok(None)
    }
}

fn derive_required_inputs(steps: &[StepDefinition], parameters: &Variables) -> BTreeSet<String> {
    let produced: BTreeSet<&String> = steps.iter().flat_map(|s| s.produced_outputs.iter()).collect();
    steps
        .iter()
        .flat_map(|s| s.required_inputs.iter())
        .filter(|key| !produced.contains(key) && !parameters.contains_key(key.as_str()))
        .cloned()
        .collect()
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse a JSON document and validate it.
pub fn parse_workflow_json(
    json: &str,
    registry: &ActionRegistry,
) -> Result<WorkflowDefinition, DefinitionError> {
    let doc: WorkflowDocument =
        serde_json::from_str(json).map_err(|e| DefinitionError::Parse(e.to_string()))?;
    WorkflowDefinition::from_document(doc, registry)
}

/// Parse a YAML document and validate it.
pub fn parse_workflow_yaml(
    yaml: &str,
    registry: &ActionRegistry,
) -> Result<WorkflowDefinition, DefinitionError> {
    let doc: WorkflowDocument =
        serde_yaml_ng::from_str(yaml).map_err(|e| DefinitionError::Parse(e.to_string()))?;
    WorkflowDefinition::from_document(doc, registry)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
