//! Mail transport provider.
//!
//! Turns an envelope into a MIME message with lettre and hands it to a
//! [`MailChannel`]. SMTP delivery itself is lettre's job; this module only
//! validates addresses, builds the message and maps channel failures.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::settings::{MailConfig, TlsMode};
use crate::error::{AppError, AppResult};
use crate::messaging::envelope::Envelope;
use crate::messaging::provider::{ProviderKind, SendReceipt, TransportProvider};

/// Outbound channel for built mail messages
#[async_trait]
pub trait MailChannel: Send + Sync {
    async fn transmit(&self, message: Message) -> anyhow::Result<()>;

    fn name(&self) -> &'static str;

    /// Checks that the channel is reachable
    async fn verify(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Delivers mail over SMTP
pub struct SmtpMailChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailChannel {
    pub fn new(transport: AsyncSmtpTransport<Tokio1Executor>) -> Self {
        Self { transport }
    }

    /// Builds the SMTP transport from mail settings
    pub fn from_config(config: &MailConfig) -> AppResult<Self> {
        let tls = match config.tls_mode {
            TlsMode::None => Tls::None,
            TlsMode::Starttls => Tls::Opportunistic(Self::tls_parameters(&config.host)?),
            TlsMode::Tls => Tls::Wrapper(Self::tls_parameters(&config.host)?),
        };

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
            .port(config.port)
            .timeout(Some(Duration::from_secs(config.timeout_seconds)))
            .tls(tls);

        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        tracing::debug!(
            host = %config.host,
            port = config.port,
            tls = config.tls_mode.as_str(),
            "SMTP mail channel configured"
        );

        Ok(Self::new(builder.build()))
    }

    fn tls_parameters(host: &str) -> AppResult<TlsParameters> {
        TlsParameters::builder(host.to_string())
            .build()
            .map_err(|e| AppError::Configuration {
                key: "mail.tls_mode".to_string(),
                source: anyhow::Error::from(e),
            })
    }
}

#[async_trait]
impl MailChannel for SmtpMailChannel {
    async fn transmit(&self, message: Message) -> anyhow::Result<()> {
        let response = self.transport.send(message).await?;
        tracing::debug!(positive = response.is_positive(), "SMTP server accepted message");
        Ok(())
    }

    async fn verify(&self) -> anyhow::Result<()> {
        if self.transport.test_connection().await? {
            Ok(())
        } else {
            anyhow::bail!("SMTP server did not accept the connection")
        }
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}

/// Writes mail to the log instead of sending it
#[derive(Debug, Default)]
pub struct LogMailChannel;

#[async_trait]
impl MailChannel for LogMailChannel {
    async fn transmit(&self, message: Message) -> anyhow::Result<()> {
        let formatted = message.formatted();
        tracing::info!(
            message = %String::from_utf8_lossy(&formatted),
            "Mail logged instead of sent"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Mail transport provider
pub struct MailProvider {
    channel: Arc<dyn MailChannel>,
}

impl MailProvider {
    pub fn new(channel: Arc<dyn MailChannel>) -> Self {
        Self { channel }
    }

    /// Builds a mail provider from settings, picking the channel by
    /// `mail.transport`
    pub fn from_config(config: &MailConfig) -> AppResult<Self> {
        let channel: Arc<dyn MailChannel> = match config.transport.as_str() {
            "smtp" => Arc::new(SmtpMailChannel::from_config(config)?),
            "log" => Arc::new(LogMailChannel),
            other => {
                return Err(AppError::Configuration {
                    key: "mail.transport".to_string(),
                    source: anyhow::anyhow!("Unsupported mail transport: {}", other),
                });
            }
        };
        Ok(Self::new(channel))
    }

    fn parse_mailbox(field: &str, value: &str) -> AppResult<Mailbox> {
        if value.trim().is_empty() {
            return Err(AppError::validation(field, format!("{} address is required", field)));
        }
        value
            .trim()
            .parse()
            .map_err(|e| AppError::validation(field, format!("Invalid {} address '{}': {}", field, value, e)))
    }

    /// Builds the MIME message for an envelope
    ///
    /// Returns the message together with the Message-ID assigned to it.
    pub fn build_message(&self, envelope: &Envelope) -> AppResult<(Message, String)> {
        let to = Self::parse_mailbox("receiver", &envelope.receiver)?;
        let from = Self::parse_mailbox("sender", &envelope.sender)?;
        let message_id = format!("<{}@{}>", envelope.id.simple(), from.email.domain());

        let mut builder = Message::builder()
            .from(from)
            .to(to)
            .subject(envelope.subject.as_str())
            .message_id(Some(message_id.clone()));

        if let Some(ref in_reply_to) = envelope.in_reply_to {
            builder = builder.in_reply_to(in_reply_to.clone());
        }
        if let Some(ref references) = envelope.references {
            builder = builder.references(references.clone());
        }

        let message = match (&envelope.body_text, &envelope.body_html) {
            (Some(text), Some(html)) => builder.multipart(
                MultiPart::alternative()
                    .singlepart(SinglePart::plain(text.clone()))
                    .singlepart(SinglePart::html(html.clone())),
            ),
            (Some(text), None) => builder.singlepart(SinglePart::plain(text.clone())),
            (None, Some(html)) => builder.singlepart(SinglePart::html(html.clone())),
            (None, None) => {
                return Err(AppError::validation("body", "Envelope has neither a text nor an HTML body"));
            }
        }
        .map_err(|e| AppError::validation("envelope", format!("Failed to build email: {}", e)))?;

        Ok((message, message_id))
    }
}

#[async_trait]
impl TransportProvider for MailProvider {
    async fn send(&self, envelope: &Envelope) -> AppResult<SendReceipt> {
        let start = Instant::now();
        let (message, message_id) = self.build_message(envelope)?;

        if let Err(e) = self.channel.transmit(message).await {
            tracing::warn!(
                envelope_id = %envelope.id,
                channel = self.channel.name(),
                receiver = %envelope.receiver,
                error = %e,
                "Mail channel failed to transmit message"
            );
            return Err(AppError::Delivery {
                provider: self.name().to_string(),
                source: e,
            });
        }

        Ok(SendReceipt {
            provider: ProviderKind::Mail,
            message_id: Some(message_id),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Mail
    }

    async fn validate_config(&self) -> AppResult<()> {
        self.channel
            .verify()
            .await
            .map_err(|e| AppError::Configuration {
                key: "mail".to_string(),
                source: e.context(format!("Mail channel '{}' is not usable", self.channel.name())),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::testing::{RecordingMailChannel, sample_envelope};

    fn provider_with(channel: Arc<RecordingMailChannel>) -> MailProvider {
        MailProvider::new(channel)
    }

    #[tokio::test]
    async fn test_send_builds_multipart_message() {
        let channel = Arc::new(RecordingMailChannel::new());
        let provider = provider_with(channel.clone());
        let envelope = sample_envelope();

        let receipt = provider.send(&envelope).await.unwrap();

        assert_eq!(receipt.provider, ProviderKind::Mail);
        let message_id = receipt.message_id.unwrap();
        assert!(message_id.ends_with("@example.com>"));

        let sent = channel.messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].envelope().to()[0].to_string(), "ada@example.com");

        let raw = String::from_utf8(sent[0].formatted()).unwrap();
        assert!(raw.contains("Subject: Hi Ada"));
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains(&message_id));
        assert!(!raw.contains("In-Reply-To"));
    }

    #[tokio::test]
    async fn test_send_sets_threading_headers() {
        let channel = Arc::new(RecordingMailChannel::new());
        let provider = provider_with(channel.clone());
        let mut envelope = sample_envelope();
        envelope.in_reply_to = Some("<thread-1@example.com>".to_string());
        envelope.references = Some("<thread-0@example.com>".to_string());

        provider.send(&envelope).await.unwrap();

        let raw = String::from_utf8(channel.messages()[0].formatted()).unwrap();
        assert!(raw.contains("In-Reply-To: <thread-1@example.com>"));
        assert!(raw.contains("References: <thread-0@example.com>"));
    }

    #[tokio::test]
    async fn test_text_only_envelope_is_single_part() {
        let channel = Arc::new(RecordingMailChannel::new());
        let provider = provider_with(channel.clone());
        let mut envelope = sample_envelope();
        envelope.body_html = None;

        provider.send(&envelope).await.unwrap();

        let raw = String::from_utf8(channel.messages()[0].formatted()).unwrap();
        assert!(!raw.contains("multipart/alternative"));
        assert!(raw.contains("text/plain"));
    }

    #[tokio::test]
    async fn test_missing_receiver_fails_before_channel() {
        let channel = Arc::new(RecordingMailChannel::new());
        let provider = provider_with(channel.clone());
        let mut envelope = sample_envelope();
        envelope.receiver = "  ".to_string();

        let err = provider.send(&envelope).await.unwrap_err();

        match err {
            AppError::Validation { field, .. } => assert_eq!(field, "receiver"),
            other => panic!("Expected Validation error, got {:?}", other),
        }
        assert!(channel.messages().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_sender_fails_before_channel() {
        let channel = Arc::new(RecordingMailChannel::new());
        let provider = provider_with(channel.clone());
        let mut envelope = sample_envelope();
        envelope.sender = "not an address".to_string();

        let err = provider.send(&envelope).await.unwrap_err();

        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "sender"));
        assert!(channel.messages().is_empty());
    }

    #[tokio::test]
    async fn test_channel_failure_becomes_delivery_error() {
        let channel = Arc::new(RecordingMailChannel::failing());
        let provider = provider_with(channel.clone());

        let err = provider.send(&sample_envelope()).await.unwrap_err();

        assert!(matches!(err, AppError::Delivery { ref provider, .. } if provider == "mail"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_from_config_rejects_unknown_transport() {
        let config = MailConfig {
            transport: "carrier-pigeon".to_string(),
            ..MailConfig::default()
        };

        let err = MailProvider::from_config(&config).err().unwrap();
        assert!(matches!(err, AppError::Configuration { ref key, .. } if key == "mail.transport"));
    }

    #[tokio::test]
    async fn test_log_channel_accepts_messages() {
        let provider = MailProvider::new(Arc::new(LogMailChannel));
        assert!(provider.send(&sample_envelope()).await.is_ok());
    }

    #[tokio::test]
    async fn test_validate_config_checks_channel() {
        let healthy = MailProvider::new(Arc::new(RecordingMailChannel::new()));
        assert!(healthy.validate_config().await.is_ok());

        let broken = MailProvider::new(Arc::new(RecordingMailChannel::failing()));
        let err = broken.validate_config().await.unwrap_err();
        assert!(matches!(err, AppError::Configuration { ref key, .. } if key == "mail"));
    }
}
