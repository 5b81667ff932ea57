//! Approval gate.
//!
//! `run` suspends the step until every approver has approved. Each resume
//! carries one `approved_by` and removes that approver from
//! `pending_approvers`; the step completes once the list is empty.

use serde_json::Value;
use wflow_core::action::{Action, ActionError, ActionOutcome, InputSpec, optional_str_list};
use wflow_types::workflow::Variables;

pub const NAME: &str = "approval";

pub const APPROVERS: &str = "approvers";
pub const APPROVED_BY: &str = "approved_by";
pub const PENDING_APPROVERS: &str = "pending_approvers";
pub const APPROVED: &str = "approved";

pub struct ApprovalAction;

impl Action for ApprovalAction {
    fn name(&self) -> &str {
        NAME
    }

    fn required_inputs(&self) -> Vec<InputSpec> {
        vec![InputSpec::new(APPROVERS, "Approver Email IDs")]
    }

    fn produced_outputs(&self) -> Vec<String> {
        vec![APPROVED.to_string(), PENDING_APPROVERS.to_string()]
    }

    async fn run(&self, inputs: &Variables) -> Result<ActionOutcome, ActionError> {
        let approvers = optional_str_list(inputs, APPROVERS)?;
        if approvers.is_empty() {
            return Ok(ActionOutcome::failed("No approvers specified")
                .with_output(APPROVED, false)
                .with_output(PENDING_APPROVERS, Value::Array(Vec::new())));
        }

        tracing::info!(approvers = ?approvers, "waiting for approval");
        Ok(ActionOutcome::waiting("Waiting for approval")
            .with_output(APPROVED, false)
            .with_output(PENDING_APPROVERS, approvers))
    }

    async fn resume(&self, inputs: &Variables) -> Result<ActionOutcome, ActionError> {
        let approved_by = match inputs.get(APPROVED_BY) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.as_str()),
            Some(other) => {
                return Err(ActionError::invalid_input(
                    APPROVED_BY,
                    format!("expected a string, got {other}"),
                ));
            }
        };

        let pending: Vec<String> = optional_str_list(inputs, PENDING_APPROVERS)?
            .into_iter()
            .filter(|approver| Some(approver.as_str()) != approved_by)
            .collect();

        tracing::info!(approved_by = ?approved_by, pending = pending.len(), "approval received");

        if pending.is_empty() {
            Ok(ActionOutcome::completed()
                .with_output(APPROVED, true)
                .with_output(PENDING_APPROVERS, pending))
        } else {
            Ok(ActionOutcome::waiting("Waiting for approval")
                .with_output(APPROVED, false)
                .with_output(PENDING_APPROVERS, pending))
        }
    }
}
