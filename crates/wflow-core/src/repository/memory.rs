//! In-process `RunRepository`.
//!
//! Backs tests and one-shot embedded use. State lives behind a single mutex;
//! no lock is held across an await point.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::Utc;
use wflow_types::error::RepositoryError;
use wflow_types::workflow::{RunRecord, RunStatus, StepRunRecord, TransactionId};

use super::run::{RunRepository, RunUpdate};

#[derive(Default)]
struct State {
    runs: HashMap<TransactionId, RunRecord>,
    steps: BTreeMap<(TransactionId, String), StepRunRecord>,
    /// Holder and expiry; `None` never expires.
    leases: HashMap<TransactionId, (String, Option<Instant>)>,
}

#[derive(Default)]
pub struct InMemoryRunRepository {
    state: Mutex<State>,
}

impl InMemoryRunRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Query("in-memory repository lock poisoned".to_string()))
    }
}

fn newest_first(runs: &mut [RunRecord]) {
    runs.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.transaction_id.cmp(&a.transaction_id))
    });
}

impl RunRepository for InMemoryRunRepository {
    async fn create_run(&self, run: &RunRecord) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if state.runs.contains_key(&run.transaction_id) {
            return Err(RepositoryError::Conflict(format!(
                "run {} already exists",
                run.transaction_id
            )));
        }
        state.runs.insert(run.transaction_id, run.clone());
        Ok(())
    }

    async fn update_run(&self, update: &RunUpdate) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let run = state
            .runs
            .get_mut(&update.transaction_id)
            .ok_or(RepositoryError::NotFound)?;
        run.status = update.status;
        run.reason = update.reason.clone();
        run.context = update.context.clone();
        run.current_step = update.current_step.clone();
        run.updated_at = Utc::now();
        Ok(())
    }

    async fn get_run(&self, id: &TransactionId) -> Result<Option<RunRecord>, RepositoryError> {
        Ok(self.lock()?.runs.get(id).cloned())
    }

    async fn latest_transaction_id(
        &self,
        workflow_name: &str,
    ) -> Result<Option<TransactionId>, RepositoryError> {
        let mut runs = self.list_runs(Some(workflow_name), 1).await?;
        Ok(runs.pop().map(|r| r.transaction_id))
    }

    async fn list_runs(
        &self,
        workflow_name: Option<&str>,
        limit: u32,
    ) -> Result<Vec<RunRecord>, RepositoryError> {
        let mut runs: Vec<RunRecord> = self
            .lock()?
            .runs
            .values()
            .filter(|r| workflow_name.is_none_or(|name| r.workflow_name == name))
            .cloned()
            .collect();
        newest_first(&mut runs);
        runs.truncate(limit as usize);
        Ok(runs)
    }

    async fn create_step_run(&self, step: &StepRunRecord) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let key = (step.transaction_id, step.step_id.clone());
        let mut record = step.clone();
        if let Some(existing) = state.steps.get(&key) {
            record.created_at = existing.created_at;
        }
        state.steps.insert(key, record);
        Ok(())
    }

    async fn update_step_run(&self, step: &StepRunRecord) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let existing = state
            .steps
            .get_mut(&(step.transaction_id, step.step_id.clone()))
            .ok_or(RepositoryError::NotFound)?;
        let created_at = existing.created_at;
        *existing = step.clone();
        existing.created_at = created_at;
        Ok(())
    }

    async fn list_step_runs(
        &self,
        id: &TransactionId,
    ) -> Result<Vec<StepRunRecord>, RepositoryError> {
        let mut steps: Vec<StepRunRecord> = self
            .lock()?
            .steps
            .values()
            .filter(|s| s.transaction_id == *id)
            .cloned()
            .collect();
        steps.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.step_id.cmp(&b.step_id))
        });
        Ok(steps)
    }

    async fn find_waiting_steps(
        &self,
        id: &TransactionId,
    ) -> Result<Vec<StepRunRecord>, RepositoryError> {
        let steps = self.list_step_runs(id).await?;
        Ok(steps
            .into_iter()
            .filter(|s| s.status == RunStatus::Waiting)
            .collect())
    }

    async fn acquire_lease(
        &self,
        id: &TransactionId,
        holder: &str,
        ttl: Duration,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.lock()?;
        let now = Instant::now();
        if let Some((current, expires)) = state.leases.get(id) {
            let live = expires.is_none_or(|at| at > now);
            if current != holder && live {
                return Ok(false);
            }
        }
        state
            .leases
            .insert(*id, (holder.to_string(), now.checked_add(ttl)));
        Ok(true)
    }

    async fn release_lease(&self, id: &TransactionId, holder: &str) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if state.leases.get(id).is_some_and(|(current, _)| current == holder) {
            state.leases.remove(id);
        }
        Ok(())
    }
}
