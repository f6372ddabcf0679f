//! Test doubles shared by the messaging tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use jiff::Timestamp;
use uuid::Uuid;

use super::context::Context;
use super::envelope::{DeliveryMode, Envelope};
use super::provider::{ProviderKind, SendReceipt, TransportProvider};
use super::providers::MailChannel;
use super::queue::{DeferredDelivery, TaskHandle, TaskQueue};
use crate::error::{AppError, AppResult};

pub(crate) fn sample_envelope() -> Envelope {
    Envelope {
        id: Uuid::new_v4(),
        sender: "hello@example.com".to_string(),
        receiver: "ada@example.com".to_string(),
        subject: "Hi Ada".to_string(),
        body_html: Some("<p>Ada</p>".to_string()),
        body_text: Some("Ada".to_string()),
        in_reply_to: None,
        references: None,
        context: Context::new(),
        mode: DeliveryMode::Immediate,
        created_at: Timestamp::now(),
    }
}

#[derive(Debug, Clone, Copy)]
enum Behavior {
    Succeed,
    /// Fails with a retryable error for the first n calls
    FailTimes(usize),
    Fail,
    Reject,
}

/// Provider that records every envelope it successfully sends
pub(crate) struct RecordingProvider {
    kind: ProviderKind,
    behavior: Behavior,
    calls: AtomicUsize,
    sent: Mutex<Vec<Envelope>>,
}

impl RecordingProvider {
    fn with_behavior(kind: ProviderKind, behavior: Behavior) -> Self {
        Self {
            kind,
            behavior,
            calls: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn new(kind: ProviderKind) -> Self {
        Self::with_behavior(kind, Behavior::Succeed)
    }

    pub(crate) fn failing(kind: ProviderKind) -> Self {
        Self::with_behavior(kind, Behavior::Fail)
    }

    pub(crate) fn failing_times(kind: ProviderKind, times: usize) -> Self {
        Self::with_behavior(kind, Behavior::FailTimes(times))
    }

    pub(crate) fn rejecting(kind: ProviderKind) -> Self {
        Self::with_behavior(kind, Behavior::Reject)
    }

    /// Number of send calls, failed ones included
    pub(crate) fn send_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn sent(&self) -> Vec<Envelope> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransportProvider for RecordingProvider {
    async fn send(&self, envelope: &Envelope) -> AppResult<SendReceipt> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);

        let fail = match self.behavior {
            Behavior::Succeed => false,
            Behavior::FailTimes(n) => call < n,
            Behavior::Fail => true,
            Behavior::Reject => {
                return Err(AppError::validation("receiver", "rejected by recording provider"));
            }
        };
        if fail {
            return Err(AppError::Delivery {
                provider: self.kind.to_string(),
                source: anyhow::anyhow!("recording provider failure"),
            });
        }

        self.sent.lock().unwrap().push(envelope.clone());
        Ok(SendReceipt {
            provider: self.kind,
            message_id: Some(envelope.id.to_string()),
            duration_ms: 0,
        })
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }
}

/// Provider whose sends take `delay` to complete
pub(crate) struct SlowProvider {
    kind: ProviderKind,
    delay: Duration,
    started: AtomicUsize,
    completed: AtomicUsize,
}

impl SlowProvider {
    pub(crate) fn new(kind: ProviderKind, delay: Duration) -> Self {
        Self {
            kind,
            delay,
            started: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        }
    }

    pub(crate) fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub(crate) fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransportProvider for SlowProvider {
    async fn send(&self, envelope: &Envelope) -> AppResult<SendReceipt> {
        self.started.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(SendReceipt {
            provider: self.kind,
            message_id: Some(envelope.id.to_string()),
            duration_ms: self.delay.as_millis() as u64,
        })
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }
}

/// Task queue that keeps deferred tasks instead of running them
///
/// Accepts any queue name unless built with [`RecordingQueue::with_queues`].
pub(crate) struct RecordingQueue {
    queues: Option<Vec<String>>,
    deferred: Mutex<Vec<(String, DeferredDelivery)>>,
}

impl RecordingQueue {
    pub(crate) fn new() -> Self {
        Self {
            queues: None,
            deferred: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_queues(names: &[&str]) -> Self {
        Self {
            queues: Some(names.iter().map(|name| name.to_string()).collect()),
            deferred: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn deferred(&self) -> Vec<(String, DeferredDelivery)> {
        self.deferred.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskQueue for RecordingQueue {
    async fn defer(&self, queue: &str, task: DeferredDelivery) -> AppResult<TaskHandle> {
        if !self.has_queue(queue).await {
            return Err(AppError::UnknownQueue {
                queue: queue.to_string(),
            });
        }
        self.deferred.lock().unwrap().push((queue.to_string(), task));
        Ok(TaskHandle::new(queue))
    }

    async fn has_queue(&self, queue: &str) -> bool {
        self.queues
            .as_ref()
            .is_none_or(|names| names.iter().any(|name| name == queue))
    }
}

/// Mail channel that records built messages
pub(crate) struct RecordingMailChannel {
    fail: bool,
    messages: Mutex<Vec<lettre::Message>>,
}

impl RecordingMailChannel {
    pub(crate) fn new() -> Self {
        Self {
            fail: false,
            messages: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            messages: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn messages(&self) -> Vec<lettre::Message> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailChannel for RecordingMailChannel {
    async fn transmit(&self, message: lettre::Message) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("connection refused");
        }
        self.messages.lock().unwrap().push(message);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }

    async fn verify(&self) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("connection refused");
        }
        Ok(())
    }
}
