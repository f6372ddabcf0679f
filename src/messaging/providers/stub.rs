//! Placeholder providers for channels without an adapter yet.

use async_trait::async_trait;

use crate::error::{AppError, AppResult};
use crate::messaging::envelope::Envelope;
use crate::messaging::provider::{ProviderKind, SendReceipt, TransportProvider};

/// Provider for a declared channel whose adapter does not exist
///
/// Registering one makes the kind resolvable, but every send fails with
/// `AppError::NotImplemented`.
#[derive(Debug, Clone, Copy)]
pub struct StubProvider {
    kind: ProviderKind,
}

impl StubProvider {
    pub fn new(kind: ProviderKind) -> Self {
        Self { kind }
    }

    /// Stubs for every channel other than mail
    pub fn all() -> Vec<Self> {
        [
            ProviderKind::Sms,
            ProviderKind::Xmpp,
            ProviderKind::SendGrid,
            ProviderKind::Flash,
        ]
        .into_iter()
        .map(Self::new)
        .collect()
    }
}

#[async_trait]
impl TransportProvider for StubProvider {
    async fn send(&self, envelope: &Envelope) -> AppResult<SendReceipt> {
        tracing::warn!(
            envelope_id = %envelope.id,
            provider = self.kind.as_str(),
            "Send attempted through unimplemented provider"
        );
        Err(AppError::NotImplemented {
            provider: self.kind.to_string(),
        })
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }
}
