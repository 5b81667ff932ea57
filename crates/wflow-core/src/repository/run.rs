//! Run repository trait definition.
//!
//! Defines the storage interface for run records, step-run records and the
//! per-transaction resume lease. The infrastructure layer (wflow-infra)
//! implements this trait with SQLite persistence; [`super::memory`] provides
//! an in-process implementation.

use std::time::Duration;

use wflow_types::error::RepositoryError;
use wflow_types::workflow::{RunRecord, RunStatus, StepRunRecord, TransactionId, Variables};

/// Fields rewritten on every run-record update.
#[derive(Debug, Clone)]
pub struct RunUpdate {
    pub transaction_id: TransactionId,
    pub status: RunStatus,
    pub reason: String,
    pub context: Variables,
    pub current_step: Option<String>,
}

/// Repository trait for run persistence.
///
/// Covers three entity families:
/// - **Runs:** one record per transaction, created at start and rewritten as
///   the run progresses.
/// - **Step runs:** one record per (transaction, step), updated in place when
///   a step is re-entered.
/// - **Leases:** a short-lived exclusive claim on a transaction held while
///   resuming it.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait RunRepository: Send + Sync {
    // -----------------------------------------------------------------------
    // Runs
    // -----------------------------------------------------------------------

    /// Insert a new run record. Fails with `Conflict` if the id exists.
    fn create_run(
        &self,
        run: &RunRecord,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Rewrite status, reason, context and current step. Fails with
    /// `NotFound` if the run does not exist.
    fn update_run(
        &self,
        update: &RunUpdate,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get_run(
        &self,
        id: &TransactionId,
    ) -> impl std::future::Future<Output = Result<Option<RunRecord>, RepositoryError>> + Send;

    /// Most recently created transaction of the named workflow.
    fn latest_transaction_id(
        &self,
        workflow_name: &str,
    ) -> impl std::future::Future<Output = Result<Option<TransactionId>, RepositoryError>> + Send;

    /// Runs ordered newest first, optionally restricted to one workflow.
    fn list_runs(
        &self,
        workflow_name: Option<&str>,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<RunRecord>, RepositoryError>> + Send;

    // -----------------------------------------------------------------------
    // Step runs
    // -----------------------------------------------------------------------

    /// Record a step execution. If the (transaction, step) pair already
    /// exists the row is overwritten and keeps its `created_at`.
    fn create_step_run(
        &self,
        step: &StepRunRecord,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Update an existing step run in place. Fails with `NotFound` otherwise.
    fn update_step_run(
        &self,
        step: &StepRunRecord,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Step runs of a transaction in creation order.
    fn list_step_runs(
        &self,
        id: &TransactionId,
    ) -> impl std::future::Future<Output = Result<Vec<StepRunRecord>, RepositoryError>> + Send;

    /// Step runs of a transaction currently in `Waiting` status.
    fn find_waiting_steps(
        &self,
        id: &TransactionId,
    ) -> impl std::future::Future<Output = Result<Vec<StepRunRecord>, RepositoryError>> + Send;

    // -----------------------------------------------------------------------
    // Leases
    // -----------------------------------------------------------------------

    /// Claim the transaction for `holder` for `ttl`. Returns `false` if
    /// another holder has an unexpired lease.
    fn acquire_lease(
        &self,
        id: &TransactionId,
        holder: &str,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Drop the lease if `holder` still owns it.
    fn release_lease(
        &self,
        id: &TransactionId,
        holder: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
