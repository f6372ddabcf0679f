//! Send command handler
//!
//! Builds a dispatcher from settings, delivers one message and, for queued
//! deliveries, waits for the local queue to drain before reporting.

use tokio::sync::broadcast::error::TryRecvError;

use crate::cli::parser::SendArgs;
use crate::config::settings::Settings;
use crate::error::{AppError, AppResult};
use crate::messaging::{
    Delivery, DeliveryEvent, DeliveryOutcome, FailureKind, MessageTemplate, ProviderKind, Telegram,
};

/// Handler for the send command
pub struct SendCommandHandler {
    config: Settings,
}

impl SendCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    /// Delivers the message described by `args`
    ///
    /// # Errors
    /// - Configuration errors while building the dispatcher
    /// - Validation, provider and template errors from the delivery
    /// - The final delivery error of a queued send
    pub async fn execute(&self, args: &SendArgs) -> AppResult<DeliveryOutcome> {
        let (telegram, queue) = Telegram::from_settings(&self.config)?;
        let mut events = telegram.subscribe();

        let template = MessageTemplate::new(
            args.from.clone().unwrap_or_default(),
            args.subject.as_str(),
            args.html.clone(),
            args.text.clone(),
        )?;

        let outcome = telegram.message(template).deliver(Self::delivery(args)).await;

        // Queued sends run on the workers; wait for them before exiting
        queue.close().await;
        let outcome = outcome?;

        match outcome {
            DeliveryOutcome::Sent(ref receipt) => {
                println!(
                    "✓ Sent via {} ({} ms){}",
                    receipt.provider,
                    receipt.duration_ms,
                    receipt
                        .message_id
                        .as_ref()
                        .map(|id| format!(", message id {}", id))
                        .unwrap_or_default()
                );
            }
            DeliveryOutcome::Queued(ref handle) => {
                Self::queued_result(&mut events)?;
                println!("✓ Task {} on queue '{}' delivered", handle.id, handle.queue);
            }
        }

        Ok(outcome)
    }

    fn delivery(args: &SendArgs) -> Delivery {
        let mut delivery = Delivery::to(args.to.as_str());
        if let Some(ref from) = args.from {
            delivery = delivery.sender(from.as_str());
        }
        if let Some(provider) = args.provider {
            delivery = delivery.provider(provider);
        }
        if let Some(as_task) = args.as_task() {
            delivery = delivery.as_task(as_task);
        }
        if let Some(ref queue) = args.queue {
            delivery = delivery.queue(queue.as_str());
        }
        if let Some(ref id) = args.in_reply_to {
            delivery = delivery.in_reply_to(id.as_str());
        }
        if let Some(ref references) = args.references {
            delivery = delivery.references(references.as_str());
        }
        for (key, value) in &args.vars {
            delivery = delivery.var(key.as_str(), value.clone());
        }
        delivery
    }

    /// Outcome of the single queued send, read from the drained event bus
    fn queued_result(events: &mut tokio::sync::broadcast::Receiver<DeliveryEvent>) -> AppResult<()> {
        let mut last_failure = None;
        loop {
            match events.try_recv() {
                Ok(DeliveryEvent::Sent { .. }) => return Ok(()),
                Ok(DeliveryEvent::Failed {
                    provider,
                    kind,
                    error,
                    ..
                }) => {
                    last_failure = Some((provider, kind, error));
                }
                Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }

        match last_failure {
            Some((provider, kind, error)) => Err(Self::failure_error(provider, kind, error)),
            None => Ok(()),
        }
    }

    /// Rebuilds the error a queued send failed with from its event
    fn failure_error(provider: ProviderKind, kind: FailureKind, error: String) -> AppError {
        match kind {
            FailureKind::NotImplemented => AppError::NotImplemented {
                provider: provider.to_string(),
            },
            FailureKind::Rejected => AppError::validation("envelope", error),
            FailureKind::Delivery | FailureKind::Timeout => AppError::Delivery {
                provider: provider.to_string(),
                source: anyhow::anyhow!(error),
            },
        }
    }

    pub fn config(&self) -> &Settings {
        &self.config
    }
}
