//! Delay step.
//!
//! Suspends the run and records when it may continue. Nothing in-process
//! sleeps; an external trigger resumes the transaction.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use wflow_core::action::{Action, ActionError, ActionOutcome, InputSpec};
use wflow_types::workflow::Variables;

pub const NAME: &str = "delay";

pub const DELAY: &str = "delay";
pub const RESUME_AFTER: &str = "resume_after";

pub struct DelayAction;

fn delay_secs(inputs: &Variables) -> Result<u64, ActionError> {
    match inputs.get(DELAY) {
        Some(Value::Number(n)) => n
            .as_u64()
            .ok_or_else(|| ActionError::invalid_input(DELAY, format!("expected whole seconds, got {n}"))),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map_err(|_| ActionError::invalid_input(DELAY, format!("expected whole seconds, got '{s}'"))),
        Some(other) => Err(ActionError::invalid_input(
            DELAY,
            format!("expected whole seconds, got {other}"),
        )),
        None => Err(ActionError::invalid_input(DELAY, "missing")),
    }
}

impl Action for DelayAction {
    fn name(&self) -> &str {
        NAME
    }

    fn required_inputs(&self) -> Vec<InputSpec> {
        vec![InputSpec::new(DELAY, "Delay in seconds")]
    }

    fn produced_outputs(&self) -> Vec<String> {
        vec![RESUME_AFTER.to_string()]
    }

    async fn run(&self, inputs: &Variables) -> Result<ActionOutcome, ActionError> {
        let secs = delay_secs(inputs)?;
        let seconds = i64::try_from(secs).unwrap_or(i64::MAX);
        let resume_after = Duration::try_seconds(seconds)
            .and_then(|delay| Utc::now().checked_add_signed(delay))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        tracing::info!(delay_secs = secs, resume_after = %resume_after, "delaying workflow");
        Ok(ActionOutcome::waiting(format!("Delayed for {secs}s"))
            .with_output(RESUME_AFTER, resume_after.to_rfc3339()))
    }

    async fn resume(&self, _inputs: &Variables) -> Result<ActionOutcome, ActionError> {
        Ok(ActionOutcome::completed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wflow_types::workflow::RunStatus;

    fn vars(value: Value) -> Variables {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_run_waits_and_records_resume_time() {
        let before = Utc::now();
        let outcome = DelayAction.run(&vars(json!({"delay": 60}))).await.unwrap();
        assert_eq!(outcome.status, RunStatus::Waiting);
        assert_eq!(outcome.reason.as_deref(), Some("Delayed for 60s"));

        let resume_after = outcome.outputs[RESUME_AFTER].as_str().unwrap();
        let resume_after = DateTime::parse_from_rfc3339(resume_after).unwrap();
        assert!(resume_after.with_timezone(&Utc) >= before + Duration::seconds(60));
    }

    #[tokio::test]
    async fn test_delay_accepts_numeric_string() {
        let outcome = DelayAction.run(&vars(json!({"delay": "5"}))).await.unwrap();
        assert_eq!(outcome.status, RunStatus::Waiting);
    }

    #[tokio::test]
    async fn test_invalid_delay_rejected() {
        let err = DelayAction.run(&vars(json!({"delay": -3}))).await.unwrap_err();
        assert!(err.to_string().contains("delay"), "got: {err}");
        assert!(DelayAction.run(&Variables::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_resume_completes() {
        let outcome = DelayAction.resume(&Variables::new()).await.unwrap();
        assert_eq!(outcome.status, RunStatus::Completed);
    }
}
