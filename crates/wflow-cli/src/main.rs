//! wflow CLI entry point.
//!
//! Binary name: `wflow`
//!
//! Parses CLI arguments, initializes tracing, the database and the action
//! registry, then dispatches to the command handler.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands};
use state::AppState;
use wflow_observe::tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions don't need tracing or app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "wflow", &mut std::io::stdout());
        return Ok(());
    }

    init_tracing(TracingOptions {
        verbosity: cli.verbose,
        json: cli.json,
        otel: cli.otel,
    })
    .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = dispatch(cli).await;
    shutdown_tracing();
    result
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let root = match cli.root {
        Some(root) => root,
        None => wflow_infra::resolve_root_dir()?,
    };
    let state = AppState::init(root).await?;

    match cli.command {
        Commands::Run {
            workflow,
            owner,
            metadata,
            inputs,
        } => {
            let inputs = cli::collect_inputs(inputs);
            let metadata = metadata.unwrap_or_default();
            cli::workflow::run_workflow(&state, &workflow, &owner, metadata, inputs, cli.json)
                .await?;
        }

        Commands::Resume {
            workflow,
            transaction,
            inputs,
        } => {
            let inputs = cli::collect_inputs(inputs);
            cli::workflow::resume_workflow(&state, &workflow, &transaction, inputs, cli.json)
                .await?;
        }

        Commands::Validate { workflow } => {
            cli::workflow::validate(&state, workflow.as_deref(), cli.json).await?;
        }

        Commands::Runs { workflow, limit } => {
            cli::history::list_runs(&state, workflow.as_deref(), limit, cli.json).await?;
        }

        Commands::Show { transaction_id } => {
            cli::history::show_run(&state, transaction_id, cli.json).await?;
        }

        Commands::Actions => {
            cli::actions::list_actions(&state, cli.json)?;
        }

        Commands::Completions { .. } => unreachable!("handled above"),
    }

    Ok(())
}
