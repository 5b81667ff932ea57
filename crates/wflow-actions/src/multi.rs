//! Fan-out over many inputs.
//!
//! `multi_action` runs one registered action once per item of `inputs`, each
//! invocation on its own task. Results are reported in input order and stop
//! at the first item that did not make forward progress.
//!
//! Every invocation sees the step's own inputs (minus `action`, `inputs` and
//! `item_key`) overlaid with the item: an object item contributes its fields,
//! any other item is placed under `item_key` (default `query`).

use serde_json::Value;
use tokio::task::JoinSet;
use wflow_core::action::{Action, ActionError, ActionOutcome, ActionRegistry, InputSpec, require_str};
use wflow_types::workflow::{RunStatus, Variables};

pub const NAME: &str = "multi_action";

pub const ACTION: &str = "action";
pub const INPUTS: &str = "inputs";
pub const ITEM_KEY: &str = "item_key";
pub const RESULTS: &str = "results";

const DEFAULT_ITEM_KEY: &str = "query";

pub struct MultiAction {
    targets: ActionRegistry,
}

impl MultiAction {
    /// `targets` are the actions an invocation may fan out to.
    pub fn new(targets: ActionRegistry) -> Self {
        Self { targets }
    }
}

fn item_inputs(base: &Variables, item_key: &str, item: Value) -> Variables {
    let mut inputs = base.clone();
    match item {
        Value::Object(fields) => inputs.extend(fields),
        other => {
            inputs.insert(item_key.to_string(), other);
        }
    }
    inputs
}

impl Action for MultiAction {
    fn name(&self) -> &str {
        NAME
    }

    fn required_inputs(&self) -> Vec<InputSpec> {
        vec![
            InputSpec::new(ACTION, "Action to execute"),
            InputSpec::new(INPUTS, "Inputs to operate on"),
        ]
    }

    fn produced_outputs(&self) -> Vec<String> {
        vec![RESULTS.to_string()]
    }

    async fn run(&self, inputs: &Variables) -> Result<ActionOutcome, ActionError> {
        let target = require_str(inputs, ACTION)?;
        let registered = self.targets.get(target).ok_or_else(|| {
            ActionError::invalid_input(ACTION, format!("unknown action '{target}'"))
        })?;
        let items = match inputs.get(INPUTS) {
            Some(Value::Array(items)) => items.clone(),
            Some(other) => {
                return Err(ActionError::invalid_input(
                    INPUTS,
                    format!("expected a list, got {other}"),
                ));
            }
            None => return Err(ActionError::invalid_input(INPUTS, "missing")),
        };
        let item_key = inputs
            .get(ITEM_KEY)
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_ITEM_KEY)
            .to_string();

        let mut base = inputs.clone();
        for key in [ACTION, INPUTS, ITEM_KEY] {
            base.remove(key);
        }

        tracing::info!(action = target, items = items.len(), "fanning out");

        let mut set: JoinSet<(usize, Result<ActionOutcome, ActionError>)> = JoinSet::new();
        let count = items.len();
        for (index, item) in items.into_iter().enumerate() {
            let action = registered.create();
            let item_inputs = item_inputs(&base, &item_key, item);
            set.spawn(async move { (index, action.run(&item_inputs).await) });
        }

        let mut slots: Vec<Option<Result<ActionOutcome, ActionError>>> =
            std::iter::repeat_with(|| None).take(count).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => {
                    tracing::error!(action = target, error = %e, "fan-out task failed");
                    set.abort_all();
                    return Ok(ActionOutcome::failed(format!("Action {target} task failed: {e}")));
                }
            }
        }

        let mut results = Vec::with_capacity(count);
        let mut status = RunStatus::Completed;
        let mut reason = None;
        for slot in slots.into_iter().flatten() {
            let outcome = slot?;
            if !outcome.status.is_forward_progress() {
                let detail = outcome
                    .reason
                    .unwrap_or_else(|| format!("Step [{}]", outcome.status));
                let status = if outcome.status.is_waiting() {
                    RunStatus::Failed
                } else {
                    outcome.status
                };
                return Ok(ActionOutcome::new(status)
                    .with_reason(format!("Action {target} failed: {detail}"))
                    .with_output(RESULTS, results));
            }
            status = outcome.status;
            reason = outcome.reason;
            results.push(Value::Object(outcome.outputs));
        }

        let mut outcome = ActionOutcome::new(status).with_output(RESULTS, results);
        outcome.reason = reason;
        Ok(outcome)
    }
}
