//! Messages and their delivery.

use std::sync::Arc;

use jiff::Timestamp;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::context::{Context, merge_contexts, to_context};
use super::dispatcher::Telegram;
use super::envelope::{DeliveryMode, Envelope};
use super::events::DeliveryEvent;
use super::provider::{ProviderKind, SendReceipt, transmit};
use super::queue::{DeferredDelivery, TaskHandle};
use super::template::{MessageTemplate, TemplateKind};
use crate::error::{AppError, AppResult};

/// Parameters of a single `deliver` call
///
/// Anything left unset falls back to the template (sender) or to the
/// dispatcher defaults (provider, as-task flag, queue name).
#[derive(Debug, Clone, Default)]
pub struct Delivery {
    receiver: Option<String>,
    sender: Option<String>,
    in_reply_to: Option<String>,
    references: Option<String>,
    provider: Option<ProviderKind>,
    as_task: Option<bool>,
    queue: Option<String>,
    context: Context,
}

impl Delivery {
    /// Starts a delivery to `receiver`
    pub fn to(receiver: impl Into<String>) -> Self {
        Self {
            receiver: Some(receiver.into()),
            ..Self::default()
        }
    }

    pub fn receiver(mut self, receiver: impl Into<String>) -> Self {
        self.receiver = Some(receiver.into());
        self
    }

    pub fn sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    pub fn in_reply_to(mut self, id: impl Into<String>) -> Self {
        self.in_reply_to = Some(id.into());
        self
    }

    pub fn references(mut self, references: impl Into<String>) -> Self {
        self.references = Some(references.into());
        self
    }

    pub fn provider(mut self, provider: ProviderKind) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn as_task(mut self, as_task: bool) -> Self {
        self.as_task = Some(as_task);
        self
    }

    pub fn queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    /// Sets one call-level context variable
    pub fn var(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Adds call-level context variables, overriding existing keys
    pub fn context(mut self, context: Context) -> Self {
        self.context.extend(context);
        self
    }

    /// Adds call-level context variables from any serializable value
    ///
    /// # Errors
    /// Validation error when `value` does not serialize to a mapping
    pub fn try_context<T: Serialize + ?Sized>(self, value: &T) -> AppResult<Self> {
        Ok(self.context(to_context(value)?))
    }
}

/// What happened to a delivered message
#[derive(Debug, Clone)]
pub enum DeliveryOutcome {
    /// Sent inline; the provider's receipt
    Sent(SendReceipt),
    /// Handed to a task queue; the send happens later
    Queued(TaskHandle),
}

impl DeliveryOutcome {
    pub fn receipt(&self) -> Option<&SendReceipt> {
        match self {
            DeliveryOutcome::Sent(receipt) => Some(receipt),
            DeliveryOutcome::Queued(_) => None,
        }
    }

    pub fn task(&self) -> Option<&TaskHandle> {
        match self {
            DeliveryOutcome::Sent(_) => None,
            DeliveryOutcome::Queued(handle) => Some(handle),
        }
    }
}

/// A message template bound to a dispatcher
///
/// Each `deliver` call is independent; the template is never modified.
#[derive(Clone)]
pub struct Message {
    template: Arc<MessageTemplate>,
    telegram: Telegram,
}

impl Message {
    pub fn new(telegram: Telegram, template: MessageTemplate) -> Self {
        Self {
            template: Arc::new(template),
            telegram,
        }
    }

    pub fn template(&self) -> &MessageTemplate {
        &self.template
    }

    /// Renders the subject with `context` layered over the template and
    /// process-wide contexts
    pub fn subject(&self, context: &Context) -> AppResult<String> {
        self.render_subject(&self.merged_context(context))
    }

    /// Renders the HTML body, if the template has one
    pub fn body_html(&self, context: &Context) -> AppResult<Option<String>> {
        self.render_body(TemplateKind::Html, &self.merged_context(context))
    }

    /// Renders the text body, if the template has one
    pub fn body_text(&self, context: &Context) -> AppResult<Option<String>> {
        self.render_body(TemplateKind::Text, &self.merged_context(context))
    }

    /// Renders and sends the message
    ///
    /// Validation, provider and queue lookup and rendering happen before
    /// anything is sent or queued, so those errors always come back from this
    /// call without any event being emitted. When
    /// the delivery is queued, channel errors stay with the queue.
    pub async fn deliver(&self, delivery: Delivery) -> AppResult<DeliveryOutcome> {
        let Delivery {
            receiver,
            sender,
            in_reply_to,
            references,
            provider,
            as_task,
            queue,
            context: call_context,
        } = delivery;
        let defaults = self.telegram.defaults();

        let receiver = non_blank(receiver)
            .ok_or_else(|| AppError::validation("receiver", "Receiver is required"))?;
        let sender = non_blank(sender)
            .or_else(|| non_blank(Some(self.template.sender().to_string())))
            .ok_or_else(|| AppError::validation("sender", "Sender is required"))?;

        let kind = provider.unwrap_or(defaults.default_provider);
        let transport = self.telegram.registry().resolve(kind)?;

        let mode = if as_task.unwrap_or(defaults.send_as_task) {
            let queue = queue.unwrap_or_else(|| defaults.queue_name.clone());
            if !self.telegram.queue().has_queue(&queue).await {
                return Err(AppError::UnknownQueue { queue });
            }
            DeliveryMode::Queued { queue }
        } else {
            DeliveryMode::Immediate
        };

        let mut context = self.merged_context(&call_context);
        context.insert("sender".to_string(), Value::String(sender.clone()));
        context.insert("receiver".to_string(), Value::String(receiver.clone()));

        let subject = self.render_subject(&context)?;
        let body_html = self.render_body(TemplateKind::Html, &context)?;
        let body_text = self.render_body(TemplateKind::Text, &context)?;

        let envelope = Arc::new(Envelope {
            id: Uuid::new_v4(),
            sender,
            receiver,
            subject,
            body_html,
            body_text,
            in_reply_to,
            references,
            context,
            mode,
            created_at: Timestamp::now(),
        });

        tracing::debug!(
            envelope_id = %envelope.id,
            sender = %envelope.sender,
            receiver = %envelope.receiver,
            provider = transport.name(),
            queued = envelope.is_queued(),
            "Message dispatched"
        );

        let events = self.telegram.events();
        events.emit(DeliveryEvent::Dispatched {
            envelope: envelope.clone(),
            provider: kind,
        });

        match envelope.mode {
            DeliveryMode::Queued { ref queue } => {
                let task = DeferredDelivery {
                    provider: transport,
                    envelope: envelope.clone(),
                    events: events.clone(),
                };
                let handle = self.telegram.queue().defer(queue, task).await?;
                tracing::info!(
                    envelope_id = %envelope.id,
                    task_id = %handle.id,
                    queue = %handle.queue,
                    "Message queued"
                );
                Ok(DeliveryOutcome::Queued(handle))
            }
            DeliveryMode::Immediate => transmit(&transport, &envelope, events)
                .await
                .map(DeliveryOutcome::Sent),
        }
    }

    fn merged_context(&self, call: &Context) -> Context {
        merge_contexts(&[&self.telegram.defaults().context, self.template.context(), call])
    }

    fn render_subject(&self, context: &Context) -> AppResult<String> {
        self.telegram
            .renderer()
            .render(TemplateKind::Subject, self.template.subject(), context)
    }

    fn render_body(&self, kind: TemplateKind, context: &Context) -> AppResult<Option<String>> {
        let name = match kind {
            TemplateKind::Html => self.template.body_html(),
            TemplateKind::Text => self.template.body_text(),
            TemplateKind::Subject => Some(self.template.subject()),
        };

        name.map(|name| self.telegram.renderer().render(kind, name, context))
            .transpose()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
