//! Configuration validation logic
//!
//! Every section checks its own ranges and formats; [`Settings::validate`]
//! adds the cross-section rules and returns the first error found.

use crate::config::error::ConfigError;
use crate::config::settings::{
    FileSettings, LoggerSettings, MailConfig, MessagingConfig, QueueConfig, Settings,
};
use crate::messaging::provider::ProviderKind;

const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

const VALID_LOG_FORMATS: &[&str] = &["full", "compact", "json"];

const VALID_MAIL_TRANSPORTS: &[&str] = &["smtp", "log"];

impl MessagingConfig {
    /// # Validation Rules
    /// - Default provider must name a known transport provider
    /// - Queue name must not be blank
    /// - Event capacity must be greater than 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_provider.parse::<ProviderKind>().is_err() {
            return Err(ConfigError::validation(
                "messaging.default_provider",
                format!(
                    "Unknown transport provider '{}'. Valid providers are: {}",
                    self.default_provider,
                    ProviderKind::ALL.map(|k| k.as_str()).join(", ")
                ),
            ));
        }

        if self.queue_name.trim().is_empty() {
            return Err(ConfigError::validation(
                "messaging.queue_name",
                "Queue name cannot be empty.",
            ));
        }

        if self.event_capacity == 0 {
            return Err(ConfigError::validation(
                "messaging.event_capacity",
                "Event capacity must be greater than 0.",
            ));
        }

        Ok(())
    }
}

impl MailConfig {
    /// # Validation Rules
    /// - Transport must be "smtp" or "log"
    /// - For SMTP, host must be set, port must be non-zero and timeout
    ///   greater than 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        let transport = self.transport.to_lowercase();
        if !VALID_MAIL_TRANSPORTS.contains(&transport.as_str()) {
            return Err(ConfigError::validation(
                "mail.transport",
                format!(
                    "Invalid mail transport '{}'. Valid transports are: {}",
                    self.transport,
                    VALID_MAIL_TRANSPORTS.join(", ")
                ),
            ));
        }

        if transport != "smtp" {
            return Ok(());
        }

        if self.host.trim().is_empty() {
            return Err(ConfigError::validation(
                "mail.host",
                "SMTP host is required when the smtp transport is used.",
            ));
        }

        if self.port == 0 {
            return Err(ConfigError::validation(
                "mail.port",
                "Port must be between 1 and 65535.",
            ));
        }

        if self.timeout_seconds == 0 {
            return Err(ConfigError::validation(
                "mail.timeout_seconds",
                "SMTP timeout must be greater than 0 seconds.",
            ));
        }

        Ok(())
    }
}

impl QueueConfig {
    /// # Validation Rules
    /// - At least one worker
    /// - Backoff multiplier of at least 1.0
    /// - Timeout greater than 0
    pub fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::validation(
                format!("queues.{}.workers", name),
                "A queue needs at least one worker.",
            ));
        }

        if self.backoff_multiplier.is_nan() || self.backoff_multiplier < 1.0 {
            return Err(ConfigError::validation(
                format!("queues.{}.backoff_multiplier", name),
                format!(
                    "Backoff multiplier must be at least 1.0, got {}.",
                    self.backoff_multiplier
                ),
            ));
        }

        if self.timeout_seconds == 0 {
            return Err(ConfigError::validation(
                format!("queues.{}.timeout_seconds", name),
                "Task timeout must be greater than 0 seconds.",
            ));
        }

        Ok(())
    }
}

impl FileSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.path.trim().is_empty() {
            return Err(ConfigError::validation(
                "logger.file.path",
                "File path is required when file logging is enabled.",
            ));
        }

        if !VALID_LOG_FORMATS.contains(&self.format.to_lowercase().as_str()) {
            return Err(ConfigError::validation(
                "logger.file.format",
                format!(
                    "Invalid log format '{}'. Valid formats are: {}",
                    self.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            ));
        }

        Ok(())
    }
}

impl LoggerSettings {
    /// # Validation Rules
    /// - Log level must be one of: trace, debug, info, warn, error
    /// - If file logging is enabled, path must not be empty
    /// - Log format must be one of: full, compact, json
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !VALID_LOG_LEVELS.contains(&self.level.to_lowercase().as_str()) {
            return Err(ConfigError::validation(
                "logger.level",
                format!(
                    "Invalid log level '{}'. Valid levels are: {}",
                    self.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            ));
        }

        self.file.validate()
    }
}

impl Settings {
    /// Validate all configuration settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.messaging.validate()?;
        self.mail.validate()?;

        let mut names: Vec<_> = self.queues.keys().collect();
        names.sort();
        for name in names {
            self.queues[name].validate(name)?;
        }

        if !self.queues.contains_key(&self.messaging.queue_name) {
            return Err(ConfigError::validation(
                "messaging.queue_name",
                format!(
                    "Default queue '{}' is not configured under [queues].",
                    self.messaging.queue_name
                ),
            ));
        }

        self.logger.validate()
    }
}
