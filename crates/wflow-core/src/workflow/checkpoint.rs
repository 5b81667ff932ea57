//! Durable checkpoints for workflow runs.
//!
//! Wraps a `RunRepository` with the writes the engine performs: the initial
//! run record, a progress update per step, the step-run record itself, and
//! the final run state. The run record doubles as the resume continuation:
//! transaction id, current step, context snapshot and last status/reason.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use wflow_types::error::RepositoryError;
use wflow_types::workflow::{RunRecord, RunStatus, StepRunRecord, TransactionId};

use super::context::ExecutionContext;
use super::engine::WORKFLOW_STARTED;
use super::result::StepResult;
use crate::repository::run::{RunRepository, RunUpdate};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("run not found: {0}")]
    RunNotFound(TransactionId),
}

// ---------------------------------------------------------------------------
// CheckpointManager
// ---------------------------------------------------------------------------

/// Generic over `R: RunRepository` so it works with any storage backend.
/// Every write completes before the engine moves on.
pub struct CheckpointManager<R: RunRepository> {
    repo: Arc<R>,
}

impl<R: RunRepository> Clone for CheckpointManager<R> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
        }
    }
}

impl<R: RunRepository> CheckpointManager<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    // -----------------------------------------------------------------------
    // Run-level checkpoints
    // -----------------------------------------------------------------------

    /// Persist the initial `Started` record for a new transaction.
    pub async fn checkpoint_run_start(
        &self,
        transaction_id: TransactionId,
        workflow_name: &str,
        ctx: &ExecutionContext,
        first_step: &str,
    ) -> Result<RunRecord, CheckpointError> {
        let now = Utc::now();
        let run = RunRecord {
            transaction_id,
            workflow_name: workflow_name.to_string(),
            working_dir: ctx.working_dir.clone(),
            owner: ctx.owner.clone(),
            metadata: ctx.metadata.clone(),
            context: ctx.variables.clone(),
            status: RunStatus::Started,
            reason: WORKFLOW_STARTED.to_string(),
            current_step: Some(first_step.to_string()),
            created_at: now,
            updated_at: now,
        };
        self.repo.create_run(&run).await?;

        tracing::debug!(
            transaction_id = %transaction_id,
            workflow = workflow_name,
            "checkpointed run start"
        );
        Ok(run)
    }

    /// Record that the step before `next_step` completed and the run has
    /// moved on to `next_step`.
    pub async fn checkpoint_progress(
        &self,
        transaction_id: TransactionId,
        reason: &str,
        ctx: &ExecutionContext,
        next_step: &str,
    ) -> Result<(), CheckpointError> {
        self.write_run(
            transaction_id,
            RunStatus::Completed,
            reason,
            ctx,
            Some(next_step.to_string()),
        )
        .await?;
        tracing::debug!(
            transaction_id = %transaction_id,
            next_step,
            "checkpointed run progress"
        );
        Ok(())
    }

    /// Persist the state the invocation ends in. `waiting_step` is kept as
    /// the resume point when the run is suspended.
    pub async fn checkpoint_run_end(
        &self,
        transaction_id: TransactionId,
        status: RunStatus,
        reason: &str,
        ctx: &ExecutionContext,
        waiting_step: Option<&str>,
    ) -> Result<(), CheckpointError> {
        self.write_run(
            transaction_id,
            status,
            reason,
            ctx,
            waiting_step.map(str::to_string),
        )
        .await?;
        tracing::debug!(
            transaction_id = %transaction_id,
            status = %status,
            reason,
            "checkpointed run end"
        );
        Ok(())
    }

    async fn write_run(
        &self,
        transaction_id: TransactionId,
        status: RunStatus,
        reason: &str,
        ctx: &ExecutionContext,
        current_step: Option<String>,
    ) -> Result<(), CheckpointError> {
        let update = RunUpdate {
            transaction_id,
            status,
            reason: reason.to_string(),
            context: ctx.variables.clone(),
            current_step,
        };
        match self.repo.update_run(&update).await {
            Err(RepositoryError::NotFound) => Err(CheckpointError::RunNotFound(transaction_id)),
            other => Ok(other?),
        }
    }

    // -----------------------------------------------------------------------
    // Step-level checkpoints
    // -----------------------------------------------------------------------

    /// Record a step execution on first visit.
    pub async fn checkpoint_step(
        &self,
        transaction_id: TransactionId,
        result: &StepResult,
    ) -> Result<(), CheckpointError> {
        self.repo
            .create_step_run(&step_record(transaction_id, result))
            .await?;
        tracing::debug!(
            transaction_id = %transaction_id,
            step_id = %result.step_id,
            status = %result.status,
            "checkpointed step"
        );
        Ok(())
    }

    /// Rewrite the record of the step a resume re-entered.
    pub async fn checkpoint_resumed_step(
        &self,
        transaction_id: TransactionId,
        result: &StepResult,
    ) -> Result<(), CheckpointError> {
        self.repo
            .update_step_run(&step_record(transaction_id, result))
            .await?;
        tracing::debug!(
            transaction_id = %transaction_id,
            step_id = %result.step_id,
            status = %result.status,
            "checkpointed resumed step"
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Restore
    // -----------------------------------------------------------------------

    pub async fn load_run(&self, transaction_id: TransactionId) -> Result<RunRecord, CheckpointError> {
        self.repo
            .get_run(&transaction_id)
            .await?
            .ok_or(CheckpointError::RunNotFound(transaction_id))
    }

    pub async fn waiting_steps(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Vec<StepRunRecord>, CheckpointError> {
        Ok(self.repo.find_waiting_steps(&transaction_id).await?)
    }

    pub async fn latest_transaction(
        &self,
        workflow_name: &str,
    ) -> Result<Option<TransactionId>, CheckpointError> {
        Ok(self.repo.latest_transaction_id(workflow_name).await?)
    }

    // -----------------------------------------------------------------------
    // Leases
    // -----------------------------------------------------------------------

    pub async fn acquire_lease(
        &self,
        transaction_id: TransactionId,
        holder: &str,
        ttl: Duration,
    ) -> Result<bool, CheckpointError> {
        Ok(self.repo.acquire_lease(&transaction_id, holder, ttl).await?)
    }

    pub async fn release_lease(
        &self,
        transaction_id: TransactionId,
        holder: &str,
    ) -> Result<(), CheckpointError> {
        Ok(self.repo.release_lease(&transaction_id, holder).await?)
    }
}

fn step_record(transaction_id: TransactionId, result: &StepResult) -> StepRunRecord {
    let now = Utc::now();
    StepRunRecord {
        transaction_id,
        step_id: result.step_id.clone(),
        action: result.action.clone(),
        input: result.inputs.clone(),
        output: result.outputs.clone(),
        status: result.status,
        reason: result.reason.clone(),
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::InMemoryRunRepository;
    use serde_json::json;
    use wflow_types::workflow::Variables;

    fn ctx() -> ExecutionContext {
        let mut variables = Variables::new();
        variables.insert("invoice_file".into(), json!("inv.pdf"));
        ExecutionContext::new(
            Variables::new(),
            Variables::new(),
            "abc@example.com",
            "/tmp/workflows/x",
            variables,
        )
    }

    fn result(step_id: &str, status: RunStatus) -> StepResult {
        StepResult {
            step_id: step_id.to_string(),
            action: "approval".to_string(),
            inputs: Variables::new(),
            outputs: Variables::new(),
            status,
            reason: format!("Step [{status}]"),
        }
    }

    #[tokio::test]
    async fn test_run_lifecycle() {
        let checkpoints = CheckpointManager::new(Arc::new(InMemoryRunRepository::new()));
        let id = TransactionId::new();
        let mut ctx = ctx();

        let run = checkpoints
            .checkpoint_run_start(id, "ap", &ctx, "extract")
            .await
            .unwrap();
        assert_eq!(run.status, RunStatus::Started);
        assert_eq!(run.reason, WORKFLOW_STARTED);
        assert_eq!(run.context["invoice_file"], json!("inv.pdf"));
        let stored = checkpoints.load_run(id).await.unwrap();
        assert_eq!(stored.reason, WORKFLOW_STARTED);

        ctx.variables.insert("data".into(), json!({"po_number": 123}));
        checkpoints
            .checkpoint_progress(id, "Step [extract] Completed", &ctx, "approve")
            .await
            .unwrap();
        let run = checkpoints.load_run(id).await.unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.reason, "Step [extract] Completed");
        assert_eq!(run.current_step.as_deref(), Some("approve"));
        assert!(run.context.contains_key("data"));

        checkpoints
            .checkpoint_run_end(id, RunStatus::Waiting, "Waiting for approval", &ctx, Some("approve"))
            .await
            .unwrap();
        let run = checkpoints.load_run(id).await.unwrap();
        assert_eq!(run.status, RunStatus::Waiting);
        assert_eq!(run.reason, "Waiting for approval");
        assert_eq!(run.current_step.as_deref(), Some("approve"));
    }

    #[tokio::test]
    async fn test_unknown_run_reported() {
        let checkpoints = CheckpointManager::new(Arc::new(InMemoryRunRepository::new()));
        let id = TransactionId::new();
        let err = checkpoints.load_run(id).await.unwrap_err();
        assert!(matches!(err, CheckpointError::RunNotFound(missing) if missing == id));

        let err = checkpoints
            .checkpoint_run_end(id, RunStatus::Completed, "done", &ctx(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckpointError::RunNotFound(_)));
    }

    #[tokio::test]
    async fn test_resumed_step_updated_in_place() {
        let checkpoints = CheckpointManager::new(Arc::new(InMemoryRunRepository::new()));
        let id = TransactionId::new();

        checkpoints
            .checkpoint_step(id, &result("approve", RunStatus::Waiting))
            .await
            .unwrap();
        assert_eq!(checkpoints.waiting_steps(id).await.unwrap().len(), 1);

        checkpoints
            .checkpoint_resumed_step(id, &result("approve", RunStatus::Completed))
            .await
            .unwrap();
        assert!(checkpoints.waiting_steps(id).await.unwrap().is_empty());
        let steps = checkpoints.repo().list_step_runs(&id).await.unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].status, RunStatus::Completed);
    }
}
