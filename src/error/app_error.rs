use thiserror::Error;

/// Library-wide error type covering every failure a delivery can hit.
///
/// Validation, provider lookup and rendering failures are raised
/// synchronously from `deliver`. Channel failures surface directly only on
/// the immediate path; on the queued path they are handled by the task queue.
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed caller input (missing recipient, non-mapping context,
    /// template without bodies, unparseable address)
    #[error("Validation failed for {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Requested transport provider is not registered
    #[error("Transport provider not found: {identifier}")]
    UnknownProvider { identifier: String },

    /// Template engine failed to compile or render a template
    #[error("Failed to render template '{template}': {reason}")]
    Template { template: String, reason: String },

    /// Underlying channel rejected or failed to transmit the message
    #[error("Delivery via {provider} failed")]
    Delivery {
        provider: String,
        #[source]
        source: anyhow::Error,
    },

    /// Provider declared but its channel adapter does not exist yet
    #[error("Transport provider {provider} is not implemented")]
    NotImplemented { provider: String },

    /// Task submitted to a queue that is not configured
    #[error("Task queue not found: {queue}")]
    UnknownQueue { queue: String },

    /// Configuration error with key information
    #[error("Configuration error: {key}")]
    Configuration {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// Internal error for unexpected failures
    #[error("Internal error")]
    Internal {
        #[source]
        source: anyhow::Error,
    },
}

impl AppError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn template(template: impl Into<String>, reason: impl ToString) -> Self {
        AppError::Template {
            template: template.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether a task queue should attempt the failed operation again.
    ///
    /// Only channel failures are transient; everything else fails the same
    /// way on every attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Delivery { .. })
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal { source: error }
    }
}

/// Type alias for Result with AppError to simplify function signatures
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_delivery_errors_are_retryable() {
        let delivery = AppError::Delivery {
            provider: "mail".to_string(),
            source: anyhow::anyhow!("connection reset"),
        };
        assert!(delivery.is_retryable());

        assert!(!AppError::validation("receiver", "required").is_retryable());
        assert!(!AppError::template("subject.hbs", "missing variable").is_retryable());
        assert!(
            !AppError::NotImplemented {
                provider: "sms".to_string()
            }
            .is_retryable()
        );
        assert!(
            !AppError::UnknownProvider {
                identifier: "pigeon".to_string()
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_error_messages_carry_context() {
        let err = AppError::UnknownProvider {
            identifier: "pigeon".to_string(),
        };
        assert_eq!(err.to_string(), "Transport provider not found: pigeon");

        let err = AppError::validation("receiver", "Receiver is required");
        assert_eq!(
            err.to_string(),
            "Validation failed for receiver: Receiver is required"
        );

        let err = AppError::template("body.html", "Variable \"name\" not found");
        assert!(err.to_string().contains("body.html"));
    }

    #[test]
    fn test_anyhow_converts_to_internal() {
        let err: AppError = anyhow::anyhow!("boom").into();
        assert!(matches!(err, AppError::Internal { .. }));
    }
}
