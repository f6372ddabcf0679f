//! CLI argument parsing with clap
//!
//! This module defines the command-line interface structure using clap,
//! including all commands, arguments, and their documentation.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::Value;

use crate::messaging::provider::ProviderKind;

/// Render a message template and deliver it through a transport provider
#[derive(Parser, Debug)]
#[command(name = "telegram-rs")]
#[command(about = "Render message templates and deliver them through transport providers")]
#[command(long_about = "
telegram-rs renders Handlebars subject and body templates with a layered
context and delivers the result through a transport provider (mail over
SMTP, or the log), either inline or through a local task queue.

EXAMPLES:
    # Send a welcome mail right away
    telegram-rs send --subject welcome/subject.txt --text welcome/body.txt \\
        --html welcome/body.html --to ada@example.com --from hello@example.com \\
        --var name=Ada

    # Queue the delivery on the 'mail' queue and wait for it to finish
    telegram-rs send --subject welcome/subject.txt --text welcome/body.txt \\
        --to ada@example.com --background --queue mail

    # Validate configuration and templates
    telegram-rs --env production check
")]
#[command(version = crate::clap_long_version())]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    ///
    /// Load this single TOML file instead of the layered configuration
    /// directory. Environment variable overrides still apply.
    #[arg(short, long, value_name = "FILE", global = true, value_parser = super::validation::validate_config_file_path)]
    pub config: Option<PathBuf>,

    /// Override environment detection
    ///
    /// Selects the `{environment}.toml` layer instead of TELEGRAM_APP_ENV.
    ///
    /// Available values: development (dev), production (prod), test
    #[arg(short, long, value_enum, global = true)]
    pub env: Option<Environment>,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render and deliver one message
    Send(SendArgs),

    /// Validate configuration and templates, then print a summary
    Check,
}

/// Arguments of the send command
#[derive(Args, Debug, Clone)]
pub struct SendArgs {
    /// Subject template name
    #[arg(long, value_name = "TEMPLATE")]
    pub subject: String,

    /// HTML body template name
    #[arg(long, value_name = "TEMPLATE")]
    pub html: Option<String>,

    /// Plain text body template name
    #[arg(long, value_name = "TEMPLATE")]
    pub text: Option<String>,

    /// Receiver address
    #[arg(long, value_name = "ADDRESS")]
    pub to: String,

    /// Sender address
    #[arg(long, value_name = "ADDRESS", env = "TELEGRAM_SENDER")]
    pub from: Option<String>,

    /// Transport provider (mail, sms, xmpp, sendgrid, flash)
    ///
    /// Defaults to messaging.default_provider.
    #[arg(long, value_name = "PROVIDER", value_parser = super::validation::parse_provider)]
    pub provider: Option<ProviderKind>,

    /// Deliver through the local task queue and wait for it to drain
    #[arg(long, conflicts_with = "immediate")]
    pub background: bool,

    /// Deliver inline even when messaging.send_as_task is set
    #[arg(long)]
    pub immediate: bool,

    /// Queue used with --background
    #[arg(long, value_name = "NAME", requires = "background")]
    pub queue: Option<String>,

    /// Template variable; values are parsed as JSON when possible
    ///
    /// Example: --var name=Ada --var count=3
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = super::validation::parse_var)]
    pub vars: Vec<(String, Value)>,

    /// Message id this message replies to
    #[arg(long, value_name = "MESSAGE_ID")]
    pub in_reply_to: Option<String>,

    /// Thread references
    #[arg(long, value_name = "MESSAGE_IDS")]
    pub references: Option<String>,
}

impl SendArgs {
    /// The as-task flag requested on the command line, if any
    pub fn as_task(&self) -> Option<bool> {
        if self.background {
            Some(true)
        } else if self.immediate {
            Some(false)
        } else {
            None
        }
    }
}

/// Environment options
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    #[value(name = "development", alias = "dev")]
    Development,
    #[value(name = "production", alias = "prod")]
    Production,
    #[value(name = "test")]
    Test,
}

impl From<Environment> for crate::config::Environment {
    fn from(env: Environment) -> Self {
        match env {
            Environment::Development => crate::config::Environment::Development,
            Environment::Production => crate::config::Environment::Production,
            Environment::Test => crate::config::Environment::Test,
        }
    }
}
