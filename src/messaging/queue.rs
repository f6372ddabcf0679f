//! Deferred execution of deliveries.
//!
//! [`TaskQueue`] is the seam between the dispatcher and whatever runs
//! queued deliveries. The adapter itself neither retries nor orders work;
//! both are properties of the queue behind it. [`LocalTaskQueue`] is an
//! in-process stand-in: named queues served by tokio workers, with
//! per-attempt timeouts and exponential backoff for transient failures.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::envelope::Envelope;
use super::events::{DeliveryEvent, EventBus, FailureKind};
use super::provider::{SendReceipt, TransportProvider, transmit};
use crate::config::settings::QueueConfig;
use crate::error::{AppError, AppResult};

/// One unit of deferred work: send this envelope through this provider
#[derive(Clone)]
pub struct DeferredDelivery {
    pub provider: Arc<dyn TransportProvider>,
    pub envelope: Arc<Envelope>,
    pub events: EventBus,
}

impl DeferredDelivery {
    pub async fn run(&self) -> AppResult<SendReceipt> {
        transmit(&self.provider, &self.envelope, &self.events).await
    }

    /// Runs the delivery, giving up after `timeout`
    ///
    /// An attempt cut off by the timeout is reported as a failed send, so
    /// every `Sending` event is still followed by `Sent` or `Failed`.
    pub async fn run_within(&self, timeout: Duration) -> AppResult<SendReceipt> {
        match tokio::time::timeout(timeout, self.run()).await {
            Ok(result) => result,
            Err(_) => {
                let error = format!("Delivery timeout after {}s", timeout.as_secs());
                self.events.emit(DeliveryEvent::Failed {
                    envelope: self.envelope.clone(),
                    provider: self.provider.kind(),
                    kind: FailureKind::Timeout,
                    error: error.clone(),
                });
                Err(AppError::Delivery {
                    provider: self.provider.name().to_string(),
                    source: anyhow::anyhow!(error),
                })
            }
        }
    }
}

impl fmt::Debug for DeferredDelivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredDelivery")
            .field("provider", &self.provider.name())
            .field("envelope_id", &self.envelope.id)
            .finish()
    }
}

/// Receipt for a task accepted by a queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskHandle {
    pub id: Uuid,
    pub queue: String,
    pub enqueued_at: Timestamp,
}

impl TaskHandle {
    pub fn new(queue: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            queue: queue.into(),
            enqueued_at: Timestamp::now(),
        }
    }
}

/// Hands deliveries to a task queue for asynchronous execution
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Submits `task` to the queue named `queue`
    ///
    /// Returns once the queue accepted the task; the send happens later.
    async fn defer(&self, queue: &str, task: DeferredDelivery) -> AppResult<TaskHandle>;

    /// Whether `defer` would accept work for `queue` right now
    async fn has_queue(&self, queue: &str) -> bool;
}

/// Retry and timeout settings for one local queue
#[derive(Debug, Clone)]
struct RetryPolicy {
    max_retries: u32,
    retry_delay: Duration,
    backoff_multiplier: f64,
    timeout: Duration,
}

impl RetryPolicy {
    fn from_config(config: &QueueConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            backoff_multiplier: config.backoff_multiplier,
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt as i32);
        Duration::from_millis((self.retry_delay.as_millis() as f64 * factor) as u64)
    }
}

struct QueuedTask {
    handle: TaskHandle,
    delivery: DeferredDelivery,
}

/// In-process task queue backed by tokio workers
///
/// Tasks live only in memory: whatever is still queued when the process
/// exits, or when [`LocalTaskQueue::shutdown`] is called, is lost.
pub struct LocalTaskQueue {
    senders: Mutex<HashMap<String, mpsc::UnboundedSender<QueuedTask>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    /// Set by `close`; workers keep draining
    closed: CancellationToken,
    /// Set by `shutdown`; workers stop
    cancellation: CancellationToken,
}

impl LocalTaskQueue {
    /// Spawns the workers for every configured queue
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(queues: &HashMap<String, QueueConfig>) -> Self {
        let cancellation = CancellationToken::new();
        let mut senders = HashMap::new();
        let mut workers = Vec::new();

        for (name, config) in queues {
            let (tx, rx) = mpsc::unbounded_channel();
            let receiver = Arc::new(Mutex::new(rx));
            let policy = Arc::new(RetryPolicy::from_config(config));

            for worker in 0..config.workers.max(1) {
                workers.push(tokio::spawn(Self::worker_loop(
                    name.clone(),
                    worker,
                    Arc::clone(&receiver),
                    Arc::clone(&policy),
                    cancellation.clone(),
                )));
            }

            tracing::debug!(queue = %name, workers = config.workers.max(1), "Task queue started");
            senders.insert(name.clone(), tx);
        }

        Self {
            senders: Mutex::new(senders),
            workers: Mutex::new(workers),
            closed: CancellationToken::new(),
            cancellation,
        }
    }

    /// Names of the queues accepting work
    pub async fn queue_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.senders.lock().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Stops accepting tasks, lets the workers finish everything already
    /// queued, then waits for them to exit
    pub async fn close(&self) {
        self.closed.cancel();
        self.senders.lock().await.clear();
        self.join_workers().await;
    }

    /// Stops the workers after their current task; queued tasks are dropped
    pub async fn shutdown(&self) {
        self.closed.cancel();
        self.senders.lock().await.clear();
        self.cancellation.cancel();
        self.join_workers().await;
    }

    async fn join_workers(&self) {
        let handles = std::mem::take(&mut *self.workers.lock().await);
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Task queue worker panicked");
            }
        }
    }

    async fn worker_loop(
        queue: String,
        worker: usize,
        receiver: Arc<Mutex<mpsc::UnboundedReceiver<QueuedTask>>>,
        policy: Arc<RetryPolicy>,
        cancellation: CancellationToken,
    ) {
        loop {
            let next = {
                let mut rx = receiver.lock().await;
                tokio::select! {
                    _ = cancellation.cancelled() => None,
                    task = rx.recv() => task,
                }
            };

            let Some(task) = next else {
                tracing::trace!(%queue, worker, "Task queue worker stopping");
                break;
            };

            Self::execute_with_retry(&policy, task).await;
        }
    }

    /// Runs a task, retrying transient failures with exponential backoff
    ///
    /// Final failures are logged; nobody is waiting for the result.
    async fn execute_with_retry(policy: &RetryPolicy, task: QueuedTask) {
        let task_id = task.handle.id;
        let queue = task.handle.queue.as_str();

        for attempt in 0..=policy.max_retries {
            let error = match task.delivery.run_within(policy.timeout).await {
                Ok(receipt) => {
                    tracing::debug!(
                        %task_id,
                        queue,
                        attempt,
                        duration_ms = receipt.duration_ms,
                        "Queued delivery completed"
                    );
                    return;
                }
                Err(e) if !e.is_retryable() => {
                    tracing::error!(%task_id, queue, attempt, error = %e, "Queued delivery failed permanently");
                    return;
                }
                Err(e) => e,
            };

            if attempt < policy.max_retries {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    %task_id,
                    queue,
                    attempt,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %error,
                    "Queued delivery failed, retrying"
                );
                tokio::time::sleep(delay).await;
            } else {
                tracing::error!(
                    %task_id,
                    queue,
                    attempts = attempt + 1,
                    error = %error,
                    "Queued delivery failed after all retries"
                );
            }
        }
    }
}

#[async_trait]
impl TaskQueue for LocalTaskQueue {
    async fn defer(&self, queue: &str, task: DeferredDelivery) -> AppResult<TaskHandle> {
        if self.cancellation.is_cancelled() {
            return Err(AppError::Internal {
                source: anyhow::anyhow!("Task queue is shut down"),
            });
        }
        if self.closed.is_cancelled() {
            return Err(AppError::Internal {
                source: anyhow::anyhow!("Task queue is closed"),
            });
        }

        let sender = self
            .senders
            .lock()
            .await
            .get(queue)
            .cloned()
            .ok_or_else(|| AppError::UnknownQueue {
                queue: queue.to_string(),
            })?;

        let handle = TaskHandle::new(queue);
        sender
            .send(QueuedTask {
                handle: handle.clone(),
                delivery: task,
            })
            .map_err(|_| AppError::Internal {
                source: anyhow::anyhow!("Task queue '{}' is closed", queue),
            })?;

        tracing::debug!(task_id = %handle.id, queue, "Delivery deferred");
        Ok(handle)
    }

    async fn has_queue(&self, queue: &str) -> bool {
        !self.closed.is_cancelled() && self.senders.lock().await.contains_key(queue)
    }
}
