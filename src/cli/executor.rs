//! Command executor for dispatching CLI commands
//!
//! This module provides the main entry point for executing CLI commands
//! after parsing and configuration loading.

use super::handlers::{CheckCommandHandler, SendCommandHandler};
use super::parser::{Cli, Commands, SendArgs};
use crate::config::settings::Settings;
use crate::error::{AppError, AppResult};

/// Execute a CLI command with the given settings
///
/// # Errors
/// Returns errors from command handlers or validation failures
pub async fn execute_command(cli: &Cli, settings: Settings) -> AppResult<()> {
    match &cli.command {
        Commands::Send(args) => {
            validate_send_args(args)?;
            SendCommandHandler::new(settings).execute(args).await?;
        }
        Commands::Check => {
            CheckCommandHandler::new(settings).execute().await?;
        }
    }

    Ok(())
}

/// Checks the send arguments clap cannot express
fn validate_send_args(args: &SendArgs) -> AppResult<()> {
    if args.to.trim().is_empty() {
        return Err(AppError::validation("to", "Receiver address cannot be empty"));
    }

    if args.subject.trim().is_empty() {
        return Err(AppError::validation("subject", "Subject template name cannot be empty"));
    }

    let has_body = [&args.html, &args.text]
        .into_iter()
        .flatten()
        .any(|name| !name.trim().is_empty());
    if !has_body {
        return Err(AppError::validation(
            "body",
            "At least one of --html or --text is required",
        ));
    }

    Ok(())
}
