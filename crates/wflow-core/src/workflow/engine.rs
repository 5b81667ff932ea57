//! Step execution engine.
//!
//! `WorkflowEngine` runs a workflow from its first step, or resumes a
//! suspended transaction at its waiting step, one step at a time.
//!
//! # Step loop
//!
//! 1. Evaluate the step's `exec_if` conditions. Any false -> `Skipped`
//!    without invoking the action.
//! 2. Invoke the action (`resume` only for the step a resume re-enters).
//! 3. Persist the step-run record, then merge mapped outputs into the context.
//! 4. Not-successful or `Waiting` ends the invocation. Any other status
//!    consults the transitions: a match continues, no match completes the
//!    run, an evaluation error fails it.
//! 5. Persist the final run record and return the outcome.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;
use wflow_types::workflow::{RunStatus, TransactionId, Variables};

use super::checkpoint::{CheckpointError, CheckpointManager};
use super::context::ExecutionContext;
use super::definition::{StepDefinition, WorkflowDefinition};
use super::permission::{AllowListPolicy, OwnerPolicy, PermissionError};
use super::result::{RunOutcome, StepResult};
use crate::action::ActionOutcome;
use crate::repository::run::RunRepository;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const WORKFLOW_STARTED: &str = "workflow started";
pub const WORKFLOW_COMPLETED: &str = "workflow completed";
pub const SKIPPED_REASON: &str = "Skipping step: condition not met";

/// How long a resume holds its transaction lease by default.
pub const DEFAULT_LEASE_TTL: Duration = Duration::from_secs(300);

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// The invocation was rejected before any step ran.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("inputs not provided [{}]: {}", .0.len(), .0.join(", "))]
    MissingInputs(Vec<String>),

    #[error(transparent)]
    Permission(#[from] PermissionError),

    #[error("no transaction to resume")]
    MissingTransactionId,

    #[error("invalid transaction id '{0}'")]
    InvalidTransactionId(String),

    #[error("transaction {transaction} belongs to workflow '{found}', not '{expected}'")]
    WorkflowMismatch {
        transaction: TransactionId,
        expected: String,
        found: String,
    },
}

/// Fatal engine errors, distinct from a run that ends `Failed`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("transaction {transaction} cannot be resumed unambiguously: {detail}")]
    AmbiguousState {
        transaction: TransactionId,
        detail: String,
    },

    #[error("transaction {0} is being resumed by another caller")]
    TransactionBusy(TransactionId),

    #[error("persistence error: {0}")]
    Persistence(#[from] CheckpointError),
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub owner: String,
    pub metadata: Variables,
    pub inputs: Variables,
}

impl RunRequest {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            ..Self::default()
        }
    }

    pub fn with_metadata(mut self, metadata: Variables) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_inputs(mut self, inputs: Variables) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_input(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.inputs.insert(key.into(), value.into());
        self
    }
}

/// Which transaction a resume targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionRef {
    /// The most recently created transaction of the workflow.
    Latest,
    Id(TransactionId),
}

impl FromStr for TransactionRef {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err(ValidationError::MissingTransactionId),
            "last" => Ok(TransactionRef::Latest),
            other => other
                .parse()
                .map(TransactionRef::Id)
                .map_err(|_| ValidationError::InvalidTransactionId(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResumeRequest {
    pub transaction: TransactionRef,
    /// Merged over the restored context.
    pub inputs: Variables,
}

impl ResumeRequest {
    pub fn new(transaction: TransactionRef) -> Self {
        Self {
            transaction,
            inputs: Variables::new(),
        }
    }

    pub fn with_input(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.inputs.insert(key.into(), value.into());
        self
    }

    pub fn with_inputs(mut self, inputs: Variables) -> Self {
        self.inputs = inputs;
        self
    }
}

// ---------------------------------------------------------------------------
// WorkflowRunner trait
// ---------------------------------------------------------------------------

/// Entry points of a workflow engine.
///
/// Uses RPITIT for async methods, consistent with the repository traits.
pub trait WorkflowRunner: Send + Sync {
    /// Start a new transaction at the first step.
    fn run(
        &self,
        request: RunRequest,
    ) -> impl std::future::Future<Output = Result<RunOutcome, EngineError>> + Send;

    /// Continue a suspended transaction at its waiting step.
    fn resume(
        &self,
        request: ResumeRequest,
    ) -> impl std::future::Future<Output = Result<RunOutcome, EngineError>> + Send;
}

// ---------------------------------------------------------------------------
// WorkflowEngine
// ---------------------------------------------------------------------------

/// Sequential step engine for one workflow definition.
///
/// Generic over `R: RunRepository` for storage flexibility.
pub struct WorkflowEngine<R: RunRepository> {
    definition: Arc<WorkflowDefinition>,
    checkpoints: CheckpointManager<R>,
    owner_policy: Arc<dyn OwnerPolicy>,
    working_root: PathBuf,
    lease_ttl: Duration,
}

impl<R: RunRepository> WorkflowEngine<R> {
    pub fn new(definition: Arc<WorkflowDefinition>, repo: Arc<R>) -> Self {
        Self {
            definition,
            checkpoints: CheckpointManager::new(repo),
            owner_policy: Arc::new(AllowListPolicy::default()),
            working_root: PathBuf::from("."),
            lease_ttl: DEFAULT_LEASE_TTL,
        }
    }

    pub fn with_owner_policy(mut self, policy: Arc<dyn OwnerPolicy>) -> Self {
        self.owner_policy = policy;
        self
    }

    /// Working directories are `{root}/workflows/{transaction_id}`.
    pub fn with_working_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.working_root = root.into();
        self
    }

    pub fn with_lease_ttl(mut self, ttl: Duration) -> Self {
        self.lease_ttl = ttl;
        self
    }

    fn validate(&self, ctx: &ExecutionContext) -> Result<(), ValidationError> {
        let missing = ctx.missing_inputs(self.definition.required_inputs());
        if !missing.is_empty() {
            return Err(ValidationError::MissingInputs(missing));
        }
        self.owner_policy.check(&ctx.owner, &self.definition.name)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Resume internals
    // -----------------------------------------------------------------------

    async fn resume_leased(
        &self,
        transaction_id: TransactionId,
        inputs: Variables,
    ) -> Result<RunOutcome, EngineError> {
        let run = match self.checkpoints.load_run(transaction_id).await {
            Ok(run) => run,
            Err(CheckpointError::RunNotFound(_)) => {
                return Err(EngineError::NotFound(format!("transaction {transaction_id}")));
            }
            Err(e) => return Err(e.into()),
        };

        if run.workflow_name != self.definition.name {
            return Err(ValidationError::WorkflowMismatch {
                transaction: transaction_id,
                expected: self.definition.name.clone(),
                found: run.workflow_name,
            }
            .into());
        }

        let waiting = self.checkpoints.waiting_steps(transaction_id).await?;
        let step_id = match waiting.as_slice() {
            [] => {
                return Err(EngineError::NotFound(format!(
                    "no waiting step in transaction {transaction_id}"
                )));
            }
            [only] => only.step_id.clone(),
            many => {
                let ids: Vec<&str> = many.iter().map(|s| s.step_id.as_str()).collect();
                return Err(EngineError::AmbiguousState {
                    transaction: transaction_id,
                    detail: format!("steps waiting: {}", ids.join(", ")),
                });
            }
        };

        if run.status.is_waiting() {
            if let Some(current) = run.current_step.as_deref().filter(|c| *c != step_id) {
                return Err(EngineError::AmbiguousState {
                    transaction: transaction_id,
                    detail: format!("run stopped at '{current}' but step '{step_id}' is waiting"),
                });
            }
        }

        let step = self.definition.step(&step_id).ok_or_else(|| {
            EngineError::NotFound(format!(
                "waiting step '{step_id}' is not part of workflow '{}'",
                self.definition.name
            ))
        })?;

        let mut ctx = ExecutionContext::new(
            self.definition.parameters.clone(),
            run.metadata,
            run.owner,
            run.working_dir,
            run.context,
        );
        ctx.merge_variables(inputs);
        self.validate(&ctx)?;

        tracing::info!(
            workflow = %self.definition.name,
            transaction_id = %transaction_id,
            step_id = %step.id,
            prior_status = %run.status,
            prior_reason = %run.reason,
            "workflow resumed"
        );

        self.drive(transaction_id, ctx, step, true, run.status, run.reason)
            .await
    }

    // -----------------------------------------------------------------------
    // Step loop
    // -----------------------------------------------------------------------

    async fn drive(
        &self,
        transaction_id: TransactionId,
        mut ctx: ExecutionContext,
        start: &StepDefinition,
        resuming: bool,
        mut status: RunStatus,
        mut reason: String,
    ) -> Result<RunOutcome, EngineError> {
        let mut current = Some(start);
        let mut resume_pending = resuming;
        let mut waiting_step: Option<String> = None;

        while let Some(step) = current {
            let result = self
                .execute_step(transaction_id, step, &ctx, resume_pending)
                .await;

            if resume_pending {
                self.checkpoints
                    .checkpoint_resumed_step(transaction_id, &result)
                    .await?;
            } else {
                self.checkpoints
                    .checkpoint_step(transaction_id, &result)
                    .await?;
            }
            resume_pending = false;
            ctx.merge_outputs(&result.outputs);

            status = result.status;
            reason = result.reason;

            current = if status.is_not_successful() {
                None
            } else if status.is_waiting() {
                waiting_step = Some(step.id.clone());
                None
            } else {
                match self.definition.next_step(step, &ctx) {
                    Err(e) => {
                        tracing::error!(
                            transaction_id = %transaction_id,
                            step_id = %step.id,
                            error = %e,
                            "transition lookup failed"
                        );
                        status = RunStatus::Failed;
                        reason = format!("Next step not found for [{}]: {e}", step.id);
                        None
                    }
                    Ok(Some(next)) => {
                        status = RunStatus::Completed;
                        reason = format!("Step [{}] Completed", step.id);
                        self.checkpoints
                            .checkpoint_progress(transaction_id, &reason, &ctx, &next.id)
                            .await?;
                        Some(next)
                    }
                    Ok(None) => {
                        status = RunStatus::Completed;
                        reason = WORKFLOW_COMPLETED.to_string();
                        None
                    }
                }
            };
        }

        self.checkpoints
            .checkpoint_run_end(transaction_id, status, &reason, &ctx, waiting_step.as_deref())
            .await?;

        tracing::info!(
            workflow = %self.definition.name,
            transaction_id = %transaction_id,
            status = %status,
            reason = %reason,
            "workflow invocation finished"
        );

        Ok(RunOutcome {
            transaction_id,
            status,
            reason,
            variables: ctx.variables,
        })
    }

    async fn execute_step(
        &self,
        transaction_id: TransactionId,
        step: &StepDefinition,
        ctx: &ExecutionContext,
        resume: bool,
    ) -> StepResult {
        let inputs = ctx.action_inputs(step);
        let finish = |inputs: Variables, outputs: Variables, status: RunStatus, reason: String| {
            StepResult {
                step_id: step.id.clone(),
                action: step.action_name.clone(),
                inputs,
                outputs,
                status,
                reason,
            }
        };

        let scope = ctx.condition_scope(&step.id, step.parameters());
        for condition in step.exec_if() {
            match condition.evaluate(&scope) {
                Ok(true) => {}
                Ok(false) => {
                    tracing::info!(
                        transaction_id = %transaction_id,
                        step_id = %step.id,
                        condition = condition.template(),
                        "skipping step"
                    );
                    return finish(
                        inputs,
                        Variables::new(),
                        RunStatus::Skipped,
                        SKIPPED_REASON.to_string(),
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        transaction_id = %transaction_id,
                        step_id = %step.id,
                        error = %e,
                        "step condition failed to evaluate"
                    );
                    return finish(
                        inputs,
                        Variables::new(),
                        RunStatus::Failed,
                        format!("Condition evaluation failed for step [{}]: {e}", step.id),
                    );
                }
            }
        }

        let action = step.instantiate();
        tracing::info!(
            transaction_id = %transaction_id,
            step_id = %step.id,
            action = %step.action_name,
            resumed = resume,
            "executing step"
        );

        let outcome = if resume {
            action.resume(&inputs).await
        } else {
            action.run(&inputs).await
        };

        match outcome {
            Ok(ActionOutcome {
                outputs,
                status,
                reason,
            }) => {
                let reason = reason.unwrap_or_else(|| format!("Step [{status}]"));
                finish(inputs, step.map_outputs(outputs), status, reason)
            }
            Err(e) => {
                tracing::error!(
                    transaction_id = %transaction_id,
                    step_id = %step.id,
                    action = %step.action_name,
                    error = %e,
                    "action raised an error"
                );
                let reason = format!("Action [{}] failed: {e}", step.action_name);
                finish(inputs, Variables::new(), RunStatus::Failed, reason)
            }
        }
    }
}

impl<R: RunRepository> WorkflowRunner for WorkflowEngine<R> {
    async fn run(&self, request: RunRequest) -> Result<RunOutcome, EngineError> {
        let transaction_id = TransactionId::new();
        let working_dir = self
            .working_root
            .join("workflows")
            .join(transaction_id.to_string());

        let ctx = ExecutionContext::new(
            self.definition.parameters.clone(),
            request.metadata,
            request.owner,
            working_dir.display().to_string(),
            request.inputs,
        );
        self.validate(&ctx)?;

        let first = self.definition.first_step();
        tracing::info!(
            workflow = %self.definition.name,
            transaction_id = %transaction_id,
            first_step = %first.id,
            owner = %ctx.owner,
            "workflow invoked"
        );

        self.checkpoints
            .checkpoint_run_start(transaction_id, &self.definition.name, &ctx, &first.id)
            .await?;

        self.drive(
            transaction_id,
            ctx,
            first,
            false,
            RunStatus::Started,
            WORKFLOW_STARTED.to_string(),
        )
        .await
    }

    async fn resume(&self, request: ResumeRequest) -> Result<RunOutcome, EngineError> {
        let transaction_id = match request.transaction {
            TransactionRef::Id(id) => id,
            TransactionRef::Latest => self
                .checkpoints
                .latest_transaction(&self.definition.name)
                .await?
                .ok_or(ValidationError::MissingTransactionId)?,
        };

        let holder = Uuid::now_v7().to_string();
        if !self
            .checkpoints
            .acquire_lease(transaction_id, &holder, self.lease_ttl)
            .await?
        {
            return Err(EngineError::TransactionBusy(transaction_id));
        }

        let outcome = self.resume_leased(transaction_id, request.inputs).await;

        if let Err(e) = self.checkpoints.release_lease(transaction_id, &holder).await {
            tracing::warn!(
                transaction_id = %transaction_id,
                error = %e,
                "failed to release resume lease"
            );
        }
        outcome
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
