//! Notification step.
//!
//! Delivery is logged; recipients default to the run owner.

use wflow_core::action::{Action, ActionError, ActionOutcome, InputSpec, optional_str_list};
use wflow_core::workflow::context::OWNER_KEY;
use wflow_types::workflow::Variables;

pub const NAME: &str = "notification";

pub const RECIPIENTS: &str = "recipients";
pub const SUBJECT: &str = "subject";
pub const NOTIFIED: &str = "notified";

pub struct NotificationAction;

impl Action for NotificationAction {
    fn name(&self) -> &str {
        NAME
    }

    fn required_inputs(&self) -> Vec<InputSpec> {
        Vec::new()
    }

    fn produced_outputs(&self) -> Vec<String> {
        vec![NOTIFIED.to_string()]
    }

    async fn run(&self, inputs: &Variables) -> Result<ActionOutcome, ActionError> {
        let mut recipients = optional_str_list(inputs, RECIPIENTS)?;
        if recipients.is_empty() {
            recipients = optional_str_list(inputs, OWNER_KEY)?;
        }
        if recipients.is_empty() {
            return Ok(ActionOutcome::failed("No recipients for notification"));
        }

        let subject = inputs
            .get(SUBJECT)
            .and_then(|v| v.as_str())
            .unwrap_or("Workflow notification");
        tracing::info!(recipients = ?recipients, subject, "notification sent");

        Ok(ActionOutcome::completed().with_output(NOTIFIED, recipients))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use wflow_types::workflow::RunStatus;

    fn vars(value: Value) -> Variables {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_recipients_default_to_owner() {
        let outcome = NotificationAction
            .run(&vars(json!({"owner": "abc@example.com"})))
            .await
            .unwrap();
        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.outputs[NOTIFIED], json!(["abc@example.com"]));
    }

    #[tokio::test]
    async fn test_explicit_recipients_win() {
        let outcome = NotificationAction
            .run(&vars(json!({
                "owner": "abc@example.com",
                "recipients": ["ap@example.com", "cfo@example.com"]
            })))
            .await
            .unwrap();
        assert_eq!(outcome.outputs[NOTIFIED], json!(["ap@example.com", "cfo@example.com"]));
    }

    #[tokio::test]
    async fn test_nobody_to_notify_fails() {
        let outcome = NotificationAction.run(&Variables::new()).await.unwrap();
        assert_eq!(outcome.status, RunStatus::Failed);
    }
}
