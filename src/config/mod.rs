//! Configuration management for telegram-rs
//!
//! Layered TOML configuration with environment variable overrides.
//!
//! # Configuration Priority (lowest to highest)
//! 1. `default.toml`
//! 2. `{environment}.toml`
//! 3. `local.toml` (not committed to version control)
//! 4. `TELEGRAM_*` environment variables

pub mod environment;
pub mod error;
pub mod loader;
pub mod settings;
pub mod validation;

pub use environment::Environment;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use settings::{MailConfig, MessagingConfig, QueueConfig, Settings, TlsMode};
