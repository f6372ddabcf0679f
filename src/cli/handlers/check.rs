//! Check command handler
//!
//! Validates configuration and templates without sending anything.

use crate::config::settings::Settings;
use crate::error::AppResult;
use crate::messaging::{ProviderKind, Telegram};

/// What a successful check found
#[derive(Debug, Clone, PartialEq)]
pub struct CheckReport {
    pub templates: Vec<String>,
    pub providers: Vec<ProviderKind>,
    pub default_provider: ProviderKind,
    pub queues: Vec<String>,
}

/// Handler for the check command
pub struct CheckCommandHandler {
    config: Settings,
}

impl CheckCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    /// Builds the dispatcher exactly as `send` would and reports on it
    ///
    /// # Errors
    /// - Configuration validation errors
    /// - Template directory or template compilation errors
    /// - Provider configuration errors
    pub async fn execute(&self) -> AppResult<CheckReport> {
        self.config
            .validate()
            .map_err(|e| anyhow::Error::from(e).context("Configuration is invalid"))?;

        let (telegram, queue) = Telegram::from_settings(&self.config)?;
        let report = Self::inspect(&telegram, queue.queue_names().await).await;
        queue.shutdown().await;
        let report = report?;

        println!("✓ Configuration is valid");
        println!(
            "✓ Application: {} {}",
            self.config.application.name, self.config.application.version
        );
        println!("✓ Templates loaded: {}", report.templates.len());
        for name in &report.templates {
            println!("    {}", name);
        }
        println!(
            "✓ Providers: {} (default: {})",
            report
                .providers
                .iter()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            report.default_provider
        );
        println!(
            "✓ Mail transport: {} ({}:{}, tls {})",
            self.config.mail.transport,
            self.config.mail.host,
            self.config.mail.port,
            self.config.mail.tls_mode.as_str()
        );
        println!("✓ Queues: {}", report.queues.join(", "));
        println!(
            "✓ Deliveries default to {}",
            if self.config.messaging.send_as_task {
                format!("queue '{}'", self.config.messaging.queue_name)
            } else {
                "immediate sending".to_string()
            }
        );

        Ok(report)
    }

    async fn inspect(telegram: &Telegram, queues: Vec<String>) -> AppResult<CheckReport> {
        let default_provider = telegram.defaults().default_provider;
        telegram
            .registry()
            .resolve(default_provider)?
            .validate_config()
            .await?;

        Ok(CheckReport {
            templates: telegram.renderer().template_names(),
            providers: telegram.registry().kinds(),
            default_provider,
            queues,
        })
    }

    pub fn config(&self) -> &Settings {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::QueueConfig;
    use crate::error::AppError;
    use std::fs;
    use tempfile::TempDir;

    fn settings() -> Settings {
        let mut settings = Settings::default();
        settings.mail.transport = "log".to_string();
        settings
    }

    #[tokio::test]
    async fn test_check_reports_templates_and_queues() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("subject.txt"), "Hi {{name}}").unwrap();
        fs::write(dir.path().join("body.html"), "<p>{{name}}</p>").unwrap();

        let mut config = settings();
        config.messaging.template_folder = dir.path().to_string_lossy().into_owned();
        config.queues.insert("mail".to_string(), QueueConfig::default());

        let report = CheckCommandHandler::new(config).execute().await.unwrap();

        assert_eq!(report.templates, vec!["body.html", "subject.txt"]);
        assert_eq!(report.default_provider, ProviderKind::Mail);
        assert_eq!(report.providers.len(), ProviderKind::ALL.len());
        assert_eq!(report.queues, vec!["default", "mail"]);
    }

    #[tokio::test]
    async fn test_check_rejects_broken_template() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("subject.txt"), "Hi {{name").unwrap();

        let mut config = settings();
        config.messaging.template_folder = dir.path().to_string_lossy().into_owned();

        let err = CheckCommandHandler::new(config).execute().await.unwrap_err();
        assert!(matches!(err, AppError::Template { .. }));
    }

    #[tokio::test]
    async fn test_check_rejects_missing_template_folder() {
        let mut config = settings();
        config.messaging.template_folder = "/definitely/not/here".to_string();

        let err = CheckCommandHandler::new(config).execute().await.unwrap_err();
        assert!(matches!(err, AppError::Configuration { ref key, .. } if key == "messaging.template_folder"));
    }

    #[tokio::test]
    async fn test_check_rejects_invalid_configuration() {
        let mut config = settings();
        config.messaging.event_capacity = 0;

        let err = CheckCommandHandler::new(config).execute().await.unwrap_err();
        assert!(matches!(err, AppError::Internal { .. }));
    }
}
