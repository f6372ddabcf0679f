//! Message dispatch.
//!
//! A [`MessageTemplate`] names the subject and body templates; binding it to
//! a [`Telegram`] dispatcher yields a [`Message`] whose `deliver` renders the
//! templates with the merged context and hands the resulting [`Envelope`] to
//! a transport provider, either inline or through a [`TaskQueue`].

pub mod context;
pub mod dispatcher;
pub mod envelope;
pub mod events;
pub mod message;
pub mod provider;
pub mod providers;
pub mod queue;
pub mod registry;
pub mod template;

#[cfg(test)]
pub(crate) mod testing;

pub use context::{Context, merge_contexts, to_context};
pub use dispatcher::{DispatchDefaults, Telegram};
pub use envelope::{DeliveryMode, Envelope};
pub use events::{DeliveryEvent, EventBus, FailureKind};
pub use message::{Delivery, DeliveryOutcome, Message};
pub use provider::{ProviderKind, SendReceipt, TransportProvider};
pub use queue::{DeferredDelivery, LocalTaskQueue, TaskHandle, TaskQueue};
pub use registry::TransportRegistry;
pub use template::{MessageTemplate, TemplateKind, TemplateRenderer};
