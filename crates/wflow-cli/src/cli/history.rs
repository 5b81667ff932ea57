//! Run history: `runs` and `show`.

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use wflow_core::repository::run::RunRepository;
use wflow_types::workflow::{RunRecord, StepRunRecord, TransactionId};

use super::{status_cell, styled_status};
use crate::state::AppState;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ---------------------------------------------------------------------------
// Runs
// ---------------------------------------------------------------------------

pub async fn list_runs(
    state: &AppState,
    workflow: Option<&str>,
    limit: u32,
    json: bool,
) -> Result<()> {
    let runs = state
        .repo
        .list_runs(workflow, limit)
        .await
        .context("failed to list runs")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&runs)?);
        return Ok(());
    }

    if runs.is_empty() {
        println!();
        match workflow {
            Some(name) => println!("  No runs for workflow '{name}'."),
            None => println!("  No runs yet."),
        }
        println!(
            "  Start one with: {}",
            style("wflow run <workflow> --input key=value").dim()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Transaction").fg(Color::Cyan),
            Cell::new("Workflow"),
            Cell::new("Owner"),
            Cell::new("Status"),
            Cell::new("Step"),
            Cell::new("Updated"),
        ]);

    for run in &runs {
        table.add_row(vec![
            Cell::new(run.transaction_id),
            Cell::new(&run.workflow_name),
            Cell::new(&run.owner),
            status_cell(run.status),
            Cell::new(run.current_step.as_deref().unwrap_or("-")),
            Cell::new(run.updated_at.format(TIME_FORMAT)),
        ]);
    }

    println!();
    println!("{table}");
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// Show
// ---------------------------------------------------------------------------

pub async fn show_run(state: &AppState, transaction_id: TransactionId, json: bool) -> Result<()> {
    let run = state
        .repo
        .get_run(&transaction_id)
        .await
        .context("failed to load run")?
        .with_context(|| format!("run {transaction_id} not found"))?;
    let steps = state
        .repo
        .list_step_runs(&transaction_id)
        .await
        .context("failed to load step history")?;

    if json {
        let out = serde_json::json!({ "run": run, "steps": steps });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    print_run(&run);
    print_steps(&steps);
    Ok(())
}

fn print_run(run: &RunRecord) {
    println!();
    println!(
        "  {} {}",
        style("Run").bold(),
        style(run.transaction_id).cyan()
    );
    println!("  Workflow: {}", style(&run.workflow_name).cyan());
    println!("  Owner: {}", run.owner);
    println!("  Status: {}", styled_status(run.status));
    println!("  Reason: {}", run.reason);
    if let Some(step) = &run.current_step {
        println!("  Current step: {step}");
    }
    println!("  Working dir: {}", run.working_dir);
    println!("  Created: {}", run.created_at.format(TIME_FORMAT));
    println!("  Updated: {}", run.updated_at.format(TIME_FORMAT));
}

fn print_steps(steps: &[StepRunRecord]) {
    println!();
    if steps.is_empty() {
        println!("  No steps executed.");
        println!();
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Step").fg(Color::Cyan),
            Cell::new("Action"),
            Cell::new("Status"),
            Cell::new("Reason"),
            Cell::new("Updated"),
        ]);

    for step in steps {
        table.add_row(vec![
            Cell::new(&step.step_id),
            Cell::new(&step.action),
            status_cell(step.status),
            Cell::new(&step.reason),
            Cell::new(step.updated_at.format(TIME_FORMAT)),
        ]);
    }

    println!("{table}");
    println!();
}
