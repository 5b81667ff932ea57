//! Results produced by the engine.

use serde::Serialize;
use wflow_types::workflow::{RunStatus, TransactionId, Variables};

/// The outcome of one step invocation. Feeds both the transition decision and
/// the persisted step-run record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepResult {
    pub step_id: String,
    pub action: String,
    /// Inputs the action saw.
    pub inputs: Variables,
    /// Outputs after output mapping. Empty for skipped steps.
    pub outputs: Variables,
    pub status: RunStatus,
    pub reason: String,
}

/// What `run` and `resume` return on every non-fatal path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    pub transaction_id: TransactionId,
    pub status: RunStatus,
    pub reason: String,
    /// The live variables at the end of the invocation.
    pub variables: Variables,
}
