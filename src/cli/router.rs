//! Command routing and execution

use crate::app::AppConfig;
use crate::cli::args::Commands;
use crate::cli::commands::{list_actions, run_tests};
use anyhow::Result;

/// Execute a CLI command; `Ok(false)` means the run completed with failures
pub async fn execute_command(command: Commands, app: &AppConfig) -> Result<bool> {
    match command {
        Commands::Run(args) => run_tests(args, app).await,
        Commands::Actions => {
            list_actions();
            Ok(true)
        }
    }
}
