//! CLI command definitions for the `wflow` binary.
//!
//! Uses clap derive macros for argument parsing. Step inputs are passed as
//! repeated `--input key=value` flags; values are read as JSON when they parse
//! and as plain strings otherwise.

pub mod actions;
pub mod history;
pub mod workflow;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use comfy_table::{Cell, Color};
use serde_json::Value;

use wflow_infra::filesystem::ROOT_DIR_ENV;
use wflow_types::config::DEFAULT_OWNER;
use wflow_types::workflow::{RunStatus, TransactionId, Variables};

/// Run and resume declarative workflows.
#[derive(Parser)]
#[command(name = "wflow", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Root directory holding definitions, the run database and working
    /// directories. Defaults to the current directory.
    #[arg(long, global = true, env = ROOT_DIR_ENV)]
    pub root: Option<PathBuf>,

    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans to stdout through OpenTelemetry.
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a new transaction of a workflow.
    Run {
        /// Workflow name (file stem under the definitions directory) or a
        /// path to a definition file.
        workflow: String,

        /// Owner the run executes as.
        #[arg(long, default_value = DEFAULT_OWNER)]
        owner: String,

        /// Run metadata as a JSON object.
        #[arg(long, value_parser = parse_json_object)]
        metadata: Option<Variables>,

        /// Workflow input as key=value. Repeatable.
        #[arg(short, long = "input", value_name = "KEY=VALUE", value_parser = parse_input)]
        inputs: Vec<(String, Value)>,
    },

    /// Continue a transaction suspended at a waiting step.
    Resume {
        /// Workflow name or definition path.
        workflow: String,

        /// Transaction id, or `last` for the workflow's most recent one.
        #[arg(default_value = "last")]
        transaction: String,

        /// Extra input as key=value. Repeatable.
        #[arg(short, long = "input", value_name = "KEY=VALUE", value_parser = parse_input)]
        inputs: Vec<(String, Value)>,
    },

    /// Validate one definition, or every definition in the definitions
    /// directory.
    Validate {
        workflow: Option<String>,
    },

    /// List recent runs.
    #[command(alias = "ls")]
    Runs {
        /// Only runs of this workflow.
        #[arg(long)]
        workflow: Option<String>,

        /// Maximum number of runs to display.
        #[arg(long, default_value = "20")]
        limit: u32,
    },

    /// Show a run and its step history.
    Show {
        transaction_id: TransactionId,
    },

    /// List the registered actions.
    Actions,

    /// Generate shell completions.
    Completions {
        shell: Shell,
    },
}

// ---------------------------------------------------------------------------
// Argument parsing
// ---------------------------------------------------------------------------

/// Parse `key=value`. The value is JSON if it parses as JSON, else a string.
pub fn parse_input(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

pub fn parse_json_object(raw: &str) -> Result<Variables, String> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!("expected a JSON object, got {other}")),
        Err(e) => Err(format!("invalid JSON: {e}")),
    }
}

/// Later pairs win over earlier ones with the same key.
pub fn collect_inputs(pairs: Vec<(String, Value)>) -> Variables {
    pairs.into_iter().collect()
}

// ---------------------------------------------------------------------------
// Shared formatting
// ---------------------------------------------------------------------------

pub(crate) fn status_color(status: RunStatus) -> Color {
    match status {
        RunStatus::Completed => Color::Green,
        RunStatus::Started => Color::Blue,
        RunStatus::Waiting => Color::Yellow,
        RunStatus::Skipped | RunStatus::Unknown => Color::DarkGrey,
        RunStatus::Failed | RunStatus::Denied | RunStatus::Killed | RunStatus::Cancelled => {
            Color::Red
        }
    }
}

pub(crate) fn status_cell(status: RunStatus) -> Cell {
    Cell::new(status.as_str()).fg(status_color(status))
}

pub(crate) fn styled_status(status: RunStatus) -> console::StyledObject<&'static str> {
    let text = status.as_str();
    match status {
        RunStatus::Completed => console::style(text).green(),
        RunStatus::Waiting => console::style(text).yellow(),
        RunStatus::Started => console::style(text).blue(),
        RunStatus::Skipped | RunStatus::Unknown => console::style(text).dim(),
        _ => console::style(text).red(),
    }
}

/// Compact single-line rendering of a variable value.
pub(crate) fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
