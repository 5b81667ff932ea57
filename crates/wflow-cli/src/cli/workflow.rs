//! `run`, `resume` and `validate`.

use anyhow::{Context, Result, bail};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use wflow_core::workflow::definition::WorkflowDefinition;
use wflow_core::workflow::{ResumeRequest, RunOutcome, RunRequest, TransactionRef, WorkflowRunner};
use wflow_infra::definitions::{discover_definitions, load_definition};
use wflow_types::workflow::{RunStatus, Variables};

use super::{render_value, styled_status};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

pub async fn run_workflow(
    state: &AppState,
    workflow: &str,
    owner: &str,
    metadata: Variables,
    inputs: Variables,
    json: bool,
) -> Result<()> {
    let definition = state.load_definition(workflow).await?;
    let name = definition.name.clone();
    let engine = state.engine(definition);

    let request = RunRequest::new(owner)
        .with_metadata(metadata)
        .with_inputs(inputs);
    let outcome = engine
        .run(request)
        .await
        .with_context(|| format!("workflow '{name}' did not start"))?;

    print_outcome(&name, &outcome, json)
}

// ---------------------------------------------------------------------------
// Resume
// ---------------------------------------------------------------------------

pub async fn resume_workflow(
    state: &AppState,
    workflow: &str,
    transaction: &str,
    inputs: Variables,
    json: bool,
) -> Result<()> {
    let transaction: TransactionRef = transaction.parse()?;
    let definition = state.load_definition(workflow).await?;
    let name = definition.name.clone();
    let engine = state.engine(definition);

    let outcome = engine
        .resume(ResumeRequest::new(transaction).with_inputs(inputs))
        .await
        .with_context(|| format!("workflow '{name}' could not be resumed"))?;

    print_outcome(&name, &outcome, json)
}

fn print_outcome(workflow: &str, outcome: &RunOutcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Workflow '{}' {}",
        style("*").bold(),
        style(workflow).cyan(),
        styled_status(outcome.status)
    );
    println!("  Transaction: {}", outcome.transaction_id);
    println!("  Reason: {}", outcome.reason);

    if !outcome.variables.is_empty() {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![Cell::new("Variable").fg(Color::Cyan), Cell::new("Value")]);
        for (key, value) in &outcome.variables {
            table.add_row(vec![Cell::new(key), Cell::new(render_value(value))]);
        }
        println!();
        println!("{table}");
    }

    if outcome.status == RunStatus::Waiting {
        println!();
        println!(
            "  Continue with: {}",
            style(format!(
                "wflow resume {workflow} {} --input key=value",
                outcome.transaction_id
            ))
            .dim()
        );
    }
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// Validate
// ---------------------------------------------------------------------------

struct Validation {
    name: String,
    result: Result<WorkflowDefinition, String>,
}

pub async fn validate(state: &AppState, workflow: Option<&str>, json: bool) -> Result<()> {
    let checked = match workflow {
        Some(name) => vec![Validation {
            name: name.to_string(),
            result: state.load_definition(name).await.map_err(|e| format!("{e:#}")),
        }],
        None => {
            let entries = discover_definitions(&state.layout.definitions_dir).await?;
            let mut checked = Vec::with_capacity(entries.len());
            for entry in entries {
                let result = load_definition(&entry.path, &state.registry)
                    .await
                    .map_err(|e| e.to_string());
                checked.push(Validation {
                    name: entry.name,
                    result,
                });
            }
            checked
        }
    };

    if checked.is_empty() {
        if json {
            println!("[]");
        } else {
            println!();
            println!(
                "  No definitions found in {}",
                style(state.layout.definitions_dir.display()).dim()
            );
            println!();
        }
        return Ok(());
    }

    let invalid = checked.iter().filter(|v| v.result.is_err()).count();

    if json {
        let out: Vec<_> = checked
            .iter()
            .map(|v| match &v.result {
                Ok(def) => serde_json::json!({
                    "name": v.name,
                    "valid": true,
                    "steps": def.steps().len(),
                    "transitions": def.transitions().len(),
                    "required_inputs": def.required_inputs(),
                }),
                Err(e) => serde_json::json!({
                    "name": v.name,
                    "valid": false,
                    "error": e,
                }),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("Definition").fg(Color::Cyan),
                Cell::new("Valid"),
                Cell::new("Steps"),
                Cell::new("Required inputs / error"),
            ]);
        for v in &checked {
            match &v.result {
                Ok(def) => table.add_row(vec![
                    Cell::new(&v.name),
                    Cell::new("yes").fg(Color::Green),
                    Cell::new(def.steps().len()),
                    Cell::new(
                        def.required_inputs()
                            .iter()
                            .cloned()
                            .collect::<Vec<_>>()
                            .join(", "),
                    ),
                ]),
                Err(e) => table.add_row(vec![
                    Cell::new(&v.name),
                    Cell::new("no").fg(Color::Red),
                    Cell::new("-"),
                    Cell::new(e).fg(Color::Red),
                ]),
            };
        }
        println!();
        println!("{table}");
        println!();
    }

    if invalid > 0 {
        bail!("{invalid} of {} definitions are invalid", checked.len());
    }
    Ok(())
}
