//! Run command handlers
//!
//! Handles run listing, status display, timelines, and cancellation.

use anyhow::Result;
use clap::Subcommand;
use colored::*;

use gantry_client::OrchestratorClient;
use gantry_core::domain::event::RunEvent;
use gantry_core::domain::run::{JobState, PipelineRun, RunState};
use gantry_core::dto::run::RunDto;

use crate::config::Config;
use crate::id_resolver::resolve_run_id;
use crate::types::IdOrPrefix;

/// Run subcommands
#[derive(Subcommand)]
pub enum RunCommands {
    /// List all runs
    List,
    /// Get run details and job states
    Get {
        /// Run ID or unambiguous prefix
        id: String,

        /// Print the raw run record as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a run's timeline
    Events {
        /// Run ID or unambiguous prefix
        id: String,
    },
    /// Cancel a run
    Cancel {
        /// Run ID or unambiguous prefix
        id: String,
    },
}

/// Handle run commands
pub async fn handle_run_command(command: RunCommands, config: &Config) -> Result<()> {
    let client = OrchestratorClient::new(&config.orchestrator_url);

    match command {
        RunCommands::List => list_runs(&client).await,
        RunCommands::Get { id, json } => get_run(&client, &id, json).await,
        RunCommands::Events { id } => get_run_events(&client, &id).await,
        RunCommands::Cancel { id } => cancel_run(&client, &id).await,
    }
}

/// List all runs
async fn list_runs(client: &OrchestratorClient) -> Result<()> {
    let runs = client.list_runs().await?;

    if runs.is_empty() {
        println!("{}", "No runs found.".yellow());
    } else {
        println!("{}", format!("Found {} run(s):", runs.len()).bold());
        println!();
        for run in runs {
            print_run_summary(&run);
        }
    }

    Ok(())
}

/// Get and display a single run
async fn get_run(client: &OrchestratorClient, id: &str, json: bool) -> Result<()> {
    let id_or_prefix = IdOrPrefix::parse(id);
    let uuid = resolve_run_id(client, &id_or_prefix).await?;

    let run = client.get_run(uuid).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&run)?);
    } else {
        print_run_details(&run);
    }

    Ok(())
}

/// Get and display a run's timeline
async fn get_run_events(client: &OrchestratorClient, id: &str) -> Result<()> {
    let id_or_prefix = IdOrPrefix::parse(id);
    let uuid = resolve_run_id(client, &id_or_prefix).await?;

    let events = client.get_run_events(uuid).await?;

    if events.is_empty() {
        println!("{}", "No events found for this run.".yellow());
    } else {
        println!("{}", format!("Timeline for run {}:", uuid).bold());
        println!("{}", "─".repeat(80).dimmed());
        for event in events {
            print_event(&event);
        }
        println!("{}", "─".repeat(80).dimmed());
    }

    Ok(())
}

/// Cancel a run
async fn cancel_run(client: &OrchestratorClient, id: &str) -> Result<()> {
    let id_or_prefix = IdOrPrefix::parse(id);
    let uuid = resolve_run_id(client, &id_or_prefix).await?;

    client.cancel_run(uuid).await?;
    println!("{} run {}", "Cancellation requested for".yellow(), uuid);
    println!(
        "{}",
        "An in-flight apply will finish its current state mutation.".dimmed()
    );

    Ok(())
}

/// Print a run summary
fn print_run_summary(run: &RunDto) {
    let state_colored = colorize_run_state(&run.state);

    println!("  {} Run {}", "▸".cyan(), run.id.to_string().dimmed());
    println!("    Trigger: {:?}", run.kind);
    println!("    Commit:  {}", run.commit_sha.dimmed());
    if let Some(tag) = &run.version_tag {
        println!("    Version: {}", tag);
    }
    println!("    State:   {}", state_colored);
    println!(
        "    Created: {}",
        run.created_at
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );
    println!();
}

/// Print detailed run information including job states
fn print_run_details(run: &PipelineRun) {
    println!("{}", "Run Details:".bold());
    println!("  ID:      {}", run.id.to_string().cyan());
    println!("  Trigger: {:?}", run.trigger.kind);
    println!("  Commit:  {}", run.trigger.commit_sha);
    if let Some(tag) = &run.trigger.version_tag {
        println!("  Version: {}", tag);
    }
    println!("  Mode:    {:?}", run.mode);
    println!("  State:   {}", colorize_run_state(&run.state));
    if let Some(digest) = &run.target_digest {
        println!("  Digest:  {}", digest.to_string().dimmed());
    }

    println!("\n{}", "Jobs:".bold());
    for job in &run.jobs {
        println!(
            "  {} {:<20} {}",
            "▸".cyan(),
            job.id,
            colorize_job_state(&job.state)
        );
        if let Some(failure) = &job.failure {
            println!("      {}", failure.red());
        }
    }
}

/// Print a timeline event
fn print_event(event: &RunEvent) {
    let scope = event
        .job_id
        .clone()
        .unwrap_or_else(|| "run".to_string());
    println!(
        "{} [{}] {}",
        event.timestamp.format("%H:%M:%S").to_string().dimmed(),
        scope.cyan(),
        event.message
    );
}

/// Colorize run state for display
fn colorize_run_state(state: &RunState) -> colored::ColoredString {
    let state_str = format!("{:?}", state);
    match state {
        RunState::Pending => state_str.yellow(),
        RunState::Running => state_str.cyan(),
        RunState::Succeeded => state_str.green(),
        RunState::Failed => state_str.red(),
        RunState::Cancelled => state_str.dimmed(),
    }
}

/// Colorize job state for display
fn colorize_job_state(state: &JobState) -> colored::ColoredString {
    let state_str = format!("{:?}", state);
    match state {
        JobState::Pending => state_str.yellow(),
        JobState::Running => state_str.cyan(),
        JobState::Succeeded => state_str.green(),
        JobState::Failed => state_str.red(),
        JobState::Skipped => state_str.dimmed(),
        JobState::Cancelled => state_str.dimmed(),
    }
}
