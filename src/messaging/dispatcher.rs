//! The dispatcher tying renderer, registry, task queue and hooks together.

use std::sync::Arc;

use tokio::sync::broadcast;

use super::context::Context;
use super::events::{DeliveryEvent, EventBus};
use super::message::Message;
use super::provider::ProviderKind;
use super::providers::{MailProvider, StubProvider};
use super::queue::{LocalTaskQueue, TaskQueue};
use super::registry::TransportRegistry;
use super::template::{MessageTemplate, TemplateRenderer};
use crate::config::settings::{MessagingConfig, Settings};
use crate::error::{AppError, AppResult};

/// Process-wide delivery defaults, applied when a delivery leaves them unset
#[derive(Debug, Clone)]
pub struct DispatchDefaults {
    pub default_provider: ProviderKind,
    pub send_as_task: bool,
    pub queue_name: String,
    /// Lowest-precedence template context
    pub context: Context,
}

impl DispatchDefaults {
    pub fn from_config(config: &MessagingConfig) -> AppResult<Self> {
        let default_provider = config.default_provider.parse().map_err(|_| AppError::Configuration {
            key: "messaging.default_provider".to_string(),
            source: anyhow::anyhow!("Unknown transport provider: {}", config.default_provider),
        })?;

        Ok(Self {
            default_provider,
            send_as_task: config.send_as_task,
            queue_name: config.queue_name.clone(),
            context: config.context.clone(),
        })
    }
}

impl Default for DispatchDefaults {
    fn default() -> Self {
        Self {
            default_provider: ProviderKind::Mail,
            send_as_task: true,
            queue_name: "default".to_string(),
            context: Context::new(),
        }
    }
}

/// Message dispatcher
///
/// Cheap to clone; every clone shares the same renderer, registry, queue and
/// event bus.
#[derive(Clone)]
pub struct Telegram {
    renderer: Arc<TemplateRenderer>,
    registry: Arc<TransportRegistry>,
    queue: Arc<dyn TaskQueue>,
    events: EventBus,
    defaults: Arc<DispatchDefaults>,
}

impl Telegram {
    pub fn new(
        renderer: TemplateRenderer,
        registry: TransportRegistry,
        queue: Arc<dyn TaskQueue>,
        defaults: DispatchDefaults,
    ) -> Self {
        Self {
            renderer: Arc::new(renderer),
            registry: Arc::new(registry),
            queue,
            events: EventBus::default(),
            defaults: Arc::new(defaults),
        }
    }

    /// Replaces the event bus, e.g. to change its capacity
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// Builds a dispatcher from settings
    ///
    /// Loads the template folder (when set), registers the mail provider and
    /// the stub providers, and starts a [`LocalTaskQueue`] for the configured
    /// queues. The queue is returned as well so the caller can close it on
    /// shutdown.
    pub fn from_settings(settings: &Settings) -> AppResult<(Self, Arc<LocalTaskQueue>)> {
        let messaging = &settings.messaging;

        let mut renderer = TemplateRenderer::new();
        if !messaging.template_folder.is_empty() {
            renderer.load_directory(&messaging.template_folder)?;
        }

        let mut registry = TransportRegistry::new();
        registry.register(Arc::new(MailProvider::from_config(&settings.mail)?));
        for stub in StubProvider::all() {
            registry.register(Arc::new(stub));
        }

        let queue = Arc::new(LocalTaskQueue::start(&settings.queues));
        let defaults = DispatchDefaults::from_config(messaging)?;

        tracing::info!(
            providers = ?registry.kinds(),
            default_provider = %defaults.default_provider,
            send_as_task = defaults.send_as_task,
            queue = %defaults.queue_name,
            "Message dispatcher initialized"
        );

        let telegram = Self::new(renderer, registry, queue.clone(), defaults)
            .with_events(EventBus::new(messaging.event_capacity));
        Ok((telegram, queue))
    }

    /// Binds a template to this dispatcher
    pub fn message(&self, template: MessageTemplate) -> Message {
        Message::new(self.clone(), template)
    }

    /// Subscribes to delivery events
    pub fn subscribe(&self) -> broadcast::Receiver<DeliveryEvent> {
        self.events.subscribe()
    }

    pub fn renderer(&self) -> &TemplateRenderer {
        &self.renderer
    }

    pub fn registry(&self) -> &TransportRegistry {
        &self.registry
    }

    pub fn queue(&self) -> &Arc<dyn TaskQueue> {
        &self.queue
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn defaults(&self) -> &DispatchDefaults {
        &self.defaults
    }
}
