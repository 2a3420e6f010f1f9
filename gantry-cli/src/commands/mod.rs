//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod approval;
mod run;
mod trigger;

pub use approval::ApprovalCommands;
pub use run::RunCommands;
pub use trigger::TriggerCommands;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Submit source-control events
    Trigger {
        #[command(subcommand)]
        command: TriggerCommands,
    },
    /// Run inspection and cancellation
    Run {
        #[command(subcommand)]
        command: RunCommands,
    },
    /// Production approval management
    Approval {
        #[command(subcommand)]
        command: ApprovalCommands,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Trigger { command } => trigger::handle_trigger_command(command, config).await,
        Commands::Run { command } => run::handle_run_command(command, config).await,
        Commands::Approval { command } => approval::handle_approval_command(command, config).await,
    }
}
