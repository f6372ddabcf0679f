//! Telegram-RS Library
//!
//! Renders message templates with a layered context and delivers them
//! through pluggable transport providers, inline or via a task queue.

use shadow_rs::shadow;
shadow!(build);

pub mod cli;
pub mod config;
pub mod error;
pub mod logger;
pub mod messaging;

pub use error::{AppError, AppResult};
pub use messaging::{Delivery, DeliveryOutcome, MessageTemplate, ProviderKind, Telegram};

pub fn pkg_version() -> &'static str {
    build::PKG_VERSION
}

pub fn clap_long_version() -> &'static str {
    build::CLAP_LONG_VERSION
}
