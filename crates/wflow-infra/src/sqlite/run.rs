//! SQLite run repository implementation.
//!
//! Implements `RunRepository` from `wflow-core` using sqlx with split
//! read/write pools. Context, metadata and step payloads are stored as JSON
//! text; timestamps as RFC 3339 strings.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;
use wflow_core::repository::run::{RunRepository, RunUpdate};
use wflow_types::error::RepositoryError;
use wflow_types::workflow::{RunRecord, RunStatus, StepRunRecord, TransactionId, Variables};

use super::pool::DatabasePool;

/// SQLite-backed implementation of `RunRepository`.
pub struct SqliteRunRepository {
    pool: DatabasePool,
}

impl SqliteRunRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Internal row types
// ---------------------------------------------------------------------------

struct RunRow {
    transaction_id: String,
    workflow_name: String,
    working_dir: String,
    owner: String,
    metadata: String,
    context: String,
    status: String,
    reason: String,
    current_step: Option<String>,
    created_at: String,
    updated_at: String,
}

impl RunRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            transaction_id: row.try_get("transaction_id")?,
            workflow_name: row.try_get("workflow_name")?,
            working_dir: row.try_get("working_dir")?,
            owner: row.try_get("owner")?,
            metadata: row.try_get("metadata")?,
            context: row.try_get("context")?,
            status: row.try_get("status")?,
            reason: row.try_get("reason")?,
            current_step: row.try_get("current_step")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_record(self) -> Result<RunRecord, RepositoryError> {
        Ok(RunRecord {
            transaction_id: parse_transaction_id(&self.transaction_id)?,
            workflow_name: self.workflow_name,
            working_dir: self.working_dir,
            owner: self.owner,
            metadata: parse_variables("metadata", &self.metadata)?,
            context: parse_variables("context", &self.context)?,
            status: parse_status(&self.status)?,
            reason: self.reason,
            current_step: self.current_step,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

struct StepRunRow {
    transaction_id: String,
    step_id: String,
    action: String,
    input: String,
    output: String,
    status: String,
    reason: String,
    created_at: String,
    updated_at: String,
}

impl StepRunRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            transaction_id: row.try_get("transaction_id")?,
            step_id: row.try_get("step_id")?,
            action: row.try_get("action")?,
            input: row.try_get("input")?,
            output: row.try_get("output")?,
            status: row.try_get("status")?,
            reason: row.try_get("reason")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_record(self) -> Result<StepRunRecord, RepositoryError> {
        Ok(StepRunRecord {
            transaction_id: parse_transaction_id(&self.transaction_id)?,
            step_id: self.step_id,
            action: self.action,
            input: parse_variables("input", &self.input)?,
            output: parse_variables("output", &self.output)?,
            status: parse_status(&self.status)?,
            reason: self.reason,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_transaction_id(s: &str) -> Result<TransactionId, RepositoryError> {
    s.parse()
        .map_err(|e| RepositoryError::Corrupt(format!("invalid transaction id '{s}': {e}")))
}

fn parse_status(s: &str) -> Result<RunStatus, RepositoryError> {
    s.parse().map_err(RepositoryError::Corrupt)
}

fn parse_variables(column: &str, s: &str) -> Result<Variables, RepositoryError> {
    serde_json::from_str(s)
        .map_err(|e| RepositoryError::Corrupt(format!("invalid {column} JSON: {e}")))
}

fn encode_variables(vars: &Variables) -> Result<String, RepositoryError> {
    serde_json::to_string(vars).map_err(|e| RepositoryError::Query(e.to_string()))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Corrupt(format!("invalid datetime: {e}")))
}

/// Fixed-width so lexical order in SQL matches time order.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn query_error(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

fn rows_into_runs(rows: &[sqlx::sqlite::SqliteRow]) -> Result<Vec<RunRecord>, RepositoryError> {
    let mut runs = Vec::with_capacity(rows.len());
    for row in rows {
        let r = RunRow::from_row(row).map_err(query_error)?;
        runs.push(r.into_record()?);
    }
    Ok(runs)
}

fn rows_into_steps(
    rows: &[sqlx::sqlite::SqliteRow],
) -> Result<Vec<StepRunRecord>, RepositoryError> {
    let mut steps = Vec::with_capacity(rows.len());
    for row in rows {
        let r = StepRunRow::from_row(row).map_err(query_error)?;
        steps.push(r.into_record()?);
    }
    Ok(steps)
}

// ---------------------------------------------------------------------------
// RunRepository impl
// ---------------------------------------------------------------------------

impl RunRepository for SqliteRunRepository {
    async fn create_run(&self, run: &RunRecord) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"INSERT INTO wf_run
               (transaction_id, workflow_name, working_dir, owner, metadata, context,
                status, reason, current_step, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(run.transaction_id.to_string())
        .bind(&run.workflow_name)
        .bind(&run.working_dir)
        .bind(&run.owner)
        .bind(encode_variables(&run.metadata)?)
        .bind(encode_variables(&run.context)?)
        .bind(run.status.as_str())
        .bind(&run.reason)
        .bind(&run.current_step)
        .bind(format_datetime(&run.created_at))
        .bind(format_datetime(&run.updated_at))
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(
                RepositoryError::Conflict(format!("run {} already exists", run.transaction_id)),
            ),
            Err(e) => Err(query_error(e)),
        }
    }

    async fn update_run(&self, update: &RunUpdate) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE wf_run
               SET status = ?, reason = ?, context = ?, current_step = ?, updated_at = ?
               WHERE transaction_id = ?"#,
        )
        .bind(update.status.as_str())
        .bind(&update.reason)
        .bind(encode_variables(&update.context)?)
        .bind(&update.current_step)
        .bind(format_datetime(&Utc::now()))
        .bind(update.transaction_id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn get_run(&self, id: &TransactionId) -> Result<Option<RunRecord>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM wf_run WHERE transaction_id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        match row {
            Some(row) => {
                let r = RunRow::from_row(&row).map_err(query_error)?;
                Ok(Some(r.into_record()?))
            }
            None => Ok(None),
        }
    }

    async fn latest_transaction_id(
        &self,
        workflow_name: &str,
    ) -> Result<Option<TransactionId>, RepositoryError> {
        let row: Option<(String,)> = sqlx::query_as(
            r#"SELECT transaction_id FROM wf_run
               WHERE workflow_name = ?
               ORDER BY created_at DESC, transaction_id DESC
               LIMIT 1"#,
        )
        .bind(workflow_name)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(query_error)?;

        row.map(|(id,)| parse_transaction_id(&id)).transpose()
    }

    async fn list_runs(
        &self,
        workflow_name: Option<&str>,
        limit: u32,
    ) -> Result<Vec<RunRecord>, RepositoryError> {
        let rows = match workflow_name {
            Some(name) => {
                sqlx::query(
                    r#"SELECT * FROM wf_run WHERE workflow_name = ?
                       ORDER BY created_at DESC, transaction_id DESC LIMIT ?"#,
                )
                .bind(name)
                .bind(limit as i64)
                .fetch_all(&self.pool.reader)
                .await
            }
            None => {
                sqlx::query(
                    "SELECT * FROM wf_run ORDER BY created_at DESC, transaction_id DESC LIMIT ?",
                )
                .bind(limit as i64)
                .fetch_all(&self.pool.reader)
                .await
            }
        }
        .map_err(query_error)?;

        rows_into_runs(&rows)
    }

    async fn create_step_run(&self, step: &StepRunRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO wf_step_run
               (transaction_id, step_id, action, input, output, status, reason,
                created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(transaction_id, step_id) DO UPDATE SET
                   action = excluded.action,
                   input = excluded.input,
                   output = excluded.output,
                   status = excluded.status,
                   reason = excluded.reason,
                   updated_at = excluded.updated_at"#,
        )
        .bind(step.transaction_id.to_string())
        .bind(&step.step_id)
        .bind(&step.action)
        .bind(encode_variables(&step.input)?)
        .bind(encode_variables(&step.output)?)
        .bind(step.status.as_str())
        .bind(&step.reason)
        .bind(format_datetime(&step.created_at))
        .bind(format_datetime(&step.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        Ok(())
    }

    async fn update_step_run(&self, step: &StepRunRecord) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE wf_step_run
               SET action = ?, input = ?, output = ?, status = ?, reason = ?, updated_at = ?
               WHERE transaction_id = ? AND step_id = ?"#,
        )
        .bind(&step.action)
        .bind(encode_variables(&step.input)?)
        .bind(encode_variables(&step.output)?)
        .bind(step.status.as_str())
        .bind(&step.reason)
        .bind(format_datetime(&step.updated_at))
        .bind(step.transaction_id.to_string())
        .bind(&step.step_id)
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn list_step_runs(
        &self,
        id: &TransactionId,
    ) -> Result<Vec<StepRunRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM wf_step_run WHERE transaction_id = ? ORDER BY created_at ASC, rowid ASC",
        )
        .bind(id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        rows_into_steps(&rows)
    }

    async fn find_waiting_steps(
        &self,
        id: &TransactionId,
    ) -> Result<Vec<StepRunRecord>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT * FROM wf_step_run
               WHERE transaction_id = ? AND status = ?
               ORDER BY created_at ASC, rowid ASC"#,
        )
        .bind(id.to_string())
        .bind(RunStatus::Waiting.as_str())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        rows_into_steps(&rows)
    }

    async fn acquire_lease(
        &self,
        id: &TransactionId,
        holder: &str,
        ttl: Duration,
    ) -> Result<bool, RepositoryError> {
        let now = Utc::now().timestamp_millis();
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = now.saturating_add(ttl_ms);

        // The conditional upsert only touches the row when the lease is free,
        // expired or already ours.
        let result = sqlx::query(
            r#"INSERT INTO wf_run_lease (transaction_id, holder, expires_at)
               VALUES (?, ?, ?)
               ON CONFLICT(transaction_id) DO UPDATE SET
                   holder = excluded.holder,
                   expires_at = excluded.expires_at
               WHERE wf_run_lease.holder = excluded.holder
                  OR wf_run_lease.expires_at <= ?"#,
        )
        .bind(id.to_string())
        .bind(holder)
        .bind(expires_at)
        .bind(now)
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        let acquired = result.rows_affected() == 1;
        if !acquired {
            tracing::debug!(transaction_id = %id, holder, "lease held by another holder");
        }
        Ok(acquired)
    }

    async fn release_lease(&self, id: &TransactionId, holder: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM wf_run_lease WHERE transaction_id = ? AND holder = ?")
            .bind(id.to_string())
            .bind(holder)
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
