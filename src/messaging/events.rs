//! Delivery notification hooks.
//!
//! Observers subscribe to an [`EventBus`] and receive every [`DeliveryEvent`]
//! emitted after they subscribed. Emitting never blocks and never fails:
//! with no subscriber the event is simply dropped, and a subscriber that
//! falls behind by more than the bus capacity loses the oldest events.

use std::sync::Arc;

use tokio::sync::broadcast;

use super::envelope::Envelope;
use super::provider::{ProviderKind, SendReceipt};
use crate::error::AppError;

/// Default number of events buffered per subscriber
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Why a send failed, as far as observers need to know
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The channel failed to transmit; worth retrying
    Delivery,
    /// The attempt ran past the queue's timeout
    Timeout,
    /// The provider has no channel adapter
    NotImplemented,
    /// The provider refused the envelope itself
    Rejected,
}

impl FailureKind {
    pub fn of(error: &AppError) -> Self {
        match error {
            AppError::Delivery { .. } => FailureKind::Delivery,
            AppError::NotImplemented { .. } => FailureKind::NotImplemented,
            _ => FailureKind::Rejected,
        }
    }
}

/// Lifecycle notifications for a single delivery
#[derive(Debug, Clone)]
pub enum DeliveryEvent {
    /// The dispatcher rendered the envelope and picked a provider
    Dispatched {
        envelope: Arc<Envelope>,
        provider: ProviderKind,
    },
    /// A provider is about to hand the envelope to its channel
    Sending {
        envelope: Arc<Envelope>,
        provider: ProviderKind,
    },
    /// The channel accepted the envelope
    Sent {
        envelope: Arc<Envelope>,
        receipt: SendReceipt,
    },
    /// The provider failed to send the envelope
    Failed {
        envelope: Arc<Envelope>,
        provider: ProviderKind,
        kind: FailureKind,
        error: String,
    },
}

impl DeliveryEvent {
    pub fn envelope(&self) -> &Arc<Envelope> {
        match self {
            DeliveryEvent::Dispatched { envelope, .. }
            | DeliveryEvent::Sending { envelope, .. }
            | DeliveryEvent::Sent { envelope, .. }
            | DeliveryEvent::Failed { envelope, .. } => envelope,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DeliveryEvent::Dispatched { .. } => "dispatched",
            DeliveryEvent::Sending { .. } => "sending",
            DeliveryEvent::Sent { .. } => "sent",
            DeliveryEvent::Failed { .. } => "failed",
        }
    }
}

/// Fire-and-forget broadcast of delivery events
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DeliveryEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DeliveryEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: DeliveryEvent) {
        let name = event.name();
        let envelope_id = event.envelope().id;
        // An error here only means nobody is listening
        if let Ok(receivers) = self.sender.send(event) {
            tracing::trace!(event = name, %envelope_id, receivers, "Delivery event emitted");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
