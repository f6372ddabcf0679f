//! Configuration settings structures for telegram-rs
//!
//! This module defines all configuration structures that can be loaded from
//! TOML files and environment variables.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::error::ConfigError;
use crate::logger::{ConsoleConfig, FileConfig, LogFormat, LoggerConfig};
use crate::messaging::context::Context;
use crate::messaging::events::DEFAULT_EVENT_CAPACITY;

/// Name of the queue that always exists
pub const DEFAULT_QUEUE: &str = "default";

// ============================================================================
// Default value functions
// ============================================================================

fn default_app_name() -> String {
    "telegram-rs".to_string()
}

fn default_app_version() -> String {
    crate::pkg_version().to_string()
}

fn default_true() -> bool {
    true
}

fn default_provider() -> String {
    "mail".to_string()
}

fn default_queue_name() -> String {
    DEFAULT_QUEUE.to_string()
}

fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}

fn default_mail_transport() -> String {
    "smtp".to_string()
}

fn default_mail_host() -> String {
    "localhost".to_string()
}

fn default_mail_port() -> u16 {
    25
}

fn default_mail_timeout() -> u64 {
    30
}

fn default_workers() -> usize {
    2
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_task_timeout() -> u64 {
    60
}

fn default_queues() -> HashMap<String, QueueConfig> {
    HashMap::from([(DEFAULT_QUEUE.to_string(), QueueConfig::default())])
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_path() -> String {
    "logs/telegram.log".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

// ============================================================================
// Application Configuration
// ============================================================================

/// Application basic information configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    #[serde(default = "default_app_name")]
    pub name: String,

    #[serde(default = "default_app_version")]
    pub version: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            version: default_app_version(),
        }
    }
}

// ============================================================================
// Messaging Configuration
// ============================================================================

/// Dispatcher defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagingConfig {
    /// Provider used when a delivery names none
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Whether deliveries go through a task queue unless told otherwise
    #[serde(default = "default_true")]
    pub send_as_task: bool,

    /// Queue used when a queued delivery names none
    #[serde(default = "default_queue_name")]
    pub queue_name: String,

    /// Directory loaded into the template renderer; empty disables loading
    #[serde(default)]
    pub template_folder: String,

    /// Process-wide template context, overridden by template and call context
    #[serde(default)]
    pub context: Context,

    /// Buffered delivery events per subscriber
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            send_as_task: true,
            queue_name: default_queue_name(),
            template_folder: String::new(),
            context: Context::new(),
            event_capacity: default_event_capacity(),
        }
    }
}

// ============================================================================
// Mail Configuration
// ============================================================================

/// How the SMTP connection is secured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TlsMode {
    /// Plain text
    None,
    /// Upgrade with STARTTLS when the server offers it
    #[default]
    Starttls,
    /// TLS from the first byte
    Tls,
}

impl TlsMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TlsMode::None => "none",
            TlsMode::Starttls => "starttls",
            TlsMode::Tls => "tls",
        }
    }
}

/// Mail transport configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailConfig {
    /// "smtp" sends for real, "log" writes messages to the log
    #[serde(default = "default_mail_transport")]
    pub transport: String,

    #[serde(default = "default_mail_host")]
    pub host: String,

    #[serde(default = "default_mail_port")]
    pub port: u16,

    /// SMTP user; empty disables authentication
    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    #[serde(default)]
    pub tls_mode: TlsMode,

    /// SMTP command timeout in seconds
    #[serde(default = "default_mail_timeout")]
    pub timeout_seconds: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            transport: default_mail_transport(),
            host: default_mail_host(),
            port: default_mail_port(),
            username: String::new(),
            password: String::new(),
            tls_mode: TlsMode::default(),
            timeout_seconds: default_mail_timeout(),
        }
    }
}

// ============================================================================
// Queue Configuration
// ============================================================================

/// One named local task queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Concurrent workers serving the queue
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Per-attempt timeout in seconds
    #[serde(default = "default_task_timeout")]
    pub timeout_seconds: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            timeout_seconds: default_task_timeout(),
        }
    }
}

// ============================================================================
// Logger Settings
// ============================================================================

/// Console output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_true")]
    pub colored: bool,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            colored: true,
        }
    }
}

/// File output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_log_path")]
    pub path: String,

    #[serde(default = "default_true")]
    pub append: bool,

    /// Log format: "full", "compact", or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_log_path(),
            append: true,
            format: default_log_format(),
        }
    }
}

/// Logger configuration as it appears in config files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerSettings {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub console: ConsoleSettings,

    #[serde(default)]
    pub file: FileSettings,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            console: ConsoleSettings::default(),
            file: FileSettings::default(),
        }
    }
}

impl LoggerSettings {
    /// Convert the file representation into the runtime logger config
    pub fn into_logger_config(self) -> Result<LoggerConfig, ConfigError> {
        let console = ConsoleConfig::new(self.console.enabled, self.console.colored);
        let format = self
            .file
            .format
            .parse::<LogFormat>()
            .map_err(|e| ConfigError::validation("logger.file.format", &e.to_string()))?;
        let file = FileConfig::new(
            self.file.enabled,
            PathBuf::from(self.file.path),
            self.file.append,
            format,
        )
        .map_err(|e| ConfigError::validation("logger.file", &e.to_string()))?;

        LoggerConfig::new(console, file, self.level)
            .map_err(|e| ConfigError::validation("logger", &e.to_string()))
    }
}

// ============================================================================
// Main Settings Structure
// ============================================================================

/// Complete application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub application: ApplicationConfig,

    #[serde(default)]
    pub messaging: MessagingConfig,

    #[serde(default)]
    pub mail: MailConfig,

    /// Local task queues by name
    #[serde(default = "default_queues")]
    pub queues: HashMap<String, QueueConfig>,

    #[serde(default)]
    pub logger: LoggerSettings,
}

impl Settings {
    /// Adds the `default` queue when the configuration left it out
    pub fn ensure_default_queue(&mut self) {
        self.queues
            .entry(DEFAULT_QUEUE.to_string())
            .or_default();
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            application: ApplicationConfig::default(),
            messaging: MessagingConfig::default(),
            mail: MailConfig::default(),
            queues: default_queues(),
            logger: LoggerSettings::default(),
        }
    }
}
