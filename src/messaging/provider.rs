//! Core transport provider trait and types.
//!
//! A transport provider takes a rendered [`Envelope`] and pushes it through
//! one channel (mail, SMS, XMPP, ...). The set of channels is closed and
//! named by [`ProviderKind`]; which implementation serves a kind is decided
//! by the registry.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::envelope::Envelope;
use super::events::{DeliveryEvent, EventBus, FailureKind};
use crate::error::{AppError, AppResult};

/// Identifier of a transport channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Mail,
    Sms,
    Xmpp,
    SendGrid,
    Flash,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 5] = [
        ProviderKind::Mail,
        ProviderKind::Sms,
        ProviderKind::Xmpp,
        ProviderKind::SendGrid,
        ProviderKind::Flash,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Mail => "mail",
            ProviderKind::Sms => "sms",
            ProviderKind::Xmpp => "xmpp",
            ProviderKind::SendGrid => "sendgrid",
            ProviderKind::Flash => "flash",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mail" | "email" | "smtp" => Ok(ProviderKind::Mail),
            "sms" => Ok(ProviderKind::Sms),
            "xmpp" => Ok(ProviderKind::Xmpp),
            "sendgrid" => Ok(ProviderKind::SendGrid),
            "flash" => Ok(ProviderKind::Flash),
            _ => Err(AppError::UnknownProvider {
                identifier: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of a successful send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    pub provider: ProviderKind,
    /// Channel-assigned message id, when the channel reports one
    pub message_id: Option<String>,
    /// Time taken by the send in milliseconds
    pub duration_ms: u64,
}

/// Trait for transport providers
///
/// Uses `async_trait` so providers can live behind `Arc<dyn TransportProvider>`
/// in the registry and travel into task queue workers.
#[async_trait]
pub trait TransportProvider: Send + Sync {
    /// Sends a rendered envelope through this provider's channel
    ///
    /// Implementations validate the fields they need before touching the
    /// channel and report channel failures as `AppError::Delivery`.
    async fn send(&self, envelope: &Envelope) -> AppResult<SendReceipt>;

    /// Channel served by this provider
    fn kind(&self) -> ProviderKind;

    /// Provider name for logging
    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Validates provider configuration (optional, default no-op)
    async fn validate_config(&self) -> AppResult<()> {
        Ok(())
    }
}

/// Sends `envelope` through `provider`, emitting the sending hook before the
/// channel call and the sent/failed hook after it.
///
/// Both the immediate path and queued tasks go through here.
pub async fn transmit(
    provider: &Arc<dyn TransportProvider>,
    envelope: &Arc<Envelope>,
    events: &EventBus,
) -> AppResult<SendReceipt> {
    let kind = provider.kind();
    events.emit(DeliveryEvent::Sending {
        envelope: envelope.clone(),
        provider: kind,
    });

    let start = Instant::now();
    match provider.send(envelope).await {
        Ok(receipt) => {
            tracing::info!(
                envelope_id = %envelope.id,
                provider = provider.name(),
                receiver = %envelope.receiver,
                duration_ms = start.elapsed().as_millis() as u64,
                "Message sent"
            );
            events.emit(DeliveryEvent::Sent {
                envelope: envelope.clone(),
                receipt: receipt.clone(),
            });
            Ok(receipt)
        }
        Err(e) => {
            tracing::error!(
                envelope_id = %envelope.id,
                provider = provider.name(),
                receiver = %envelope.receiver,
                error = %e,
                "Message send failed"
            );
            events.emit(DeliveryEvent::Failed {
                envelope: envelope.clone(),
                provider: kind,
                kind: FailureKind::of(&e),
                error: e.to_string(),
            });
            Err(e)
        }
    }
}
