//! Durable retry queue
//!
//! Event payloads are queued, persisted, and delivered with exponential
//! backoff. Each item survives page loads through the key-value store
//! and is removed only on acknowledged delivery or after exhausting its
//! attempts. Delivery is skipped (but acknowledged) for known crawler
//! user agents.
//!
//! The queue runs as a task owning all queue state; callers hold a
//! cheap-clone [`QueueHandle`] and never block on delivery.

mod item;

pub use item::{QueueItem, QUEUE_KEY_PREFIX};

use std::time::Duration;

use rand::Rng;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use beacon_core::Payload;
use beacon_store::{SharedStore, StoreOptions};
use beacon_transport::{is_bot_user_agent, Request, SharedTransport};

/// Queue tuning knobs.
#[derive(Debug, Clone)]
pub struct QueueOptions {
    /// First retry delay, in milliseconds.
    pub min_retry_delay_ms: u64,
    /// Retry delay ceiling, in milliseconds.
    pub max_retry_delay_ms: u64,
    /// Most items held at once; the oldest is evicted beyond this.
    pub max_items: usize,
    /// Delivery attempts per item before it is dropped.
    pub max_attempts: u32,
    /// Backoff multiplier applied per attempt.
    pub backoff_factor: u32,
    /// Random jitter added to each delay, in milliseconds.
    pub backoff_jitter_ms: u64,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            min_retry_delay_ms: 30_000,
            max_retry_delay_ms: 120_000,
            max_items: 5,
            max_attempts: 10,
            backoff_factor: 2,
            backoff_jitter_ms: 0,
        }
    }
}

impl QueueOptions {
    /// Delay before the next attempt of an item that has already failed
    /// `attempts` times.
    pub fn retry_delay(&self, attempts: u32) -> Duration {
        let factor = u64::from(self.backoff_factor).saturating_pow(attempts.saturating_sub(1));
        let base = self
            .min_retry_delay_ms
            .saturating_mul(factor)
            .min(self.max_retry_delay_ms);
        let jitter = if self.backoff_jitter_ms > 0 {
            rand::rng().random_range(0..=self.backoff_jitter_ms)
        } else {
            0
        };
        Duration::from_millis(base + jitter)
    }
}

enum QueueCommand {
    Add(Box<Payload>),
    Shutdown,
}

/// Cheap-clone handle to the queue task.
#[derive(Clone)]
pub struct QueueHandle {
    tx: mpsc::Sender<QueueCommand>,
}

impl QueueHandle {
    /// Queue one payload. Never blocks; if the queue task is saturated
    /// or gone the payload is dropped with a warning.
    pub fn add_item(&self, payload: Payload) {
        if let Err(e) = self.tx.try_send(QueueCommand::Add(Box::new(payload))) {
            warn!(error = %e, "retry queue unavailable, dropping event");
        }
    }

    /// Ask the queue task to stop. Pending items stay persisted for the
    /// next start.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(QueueCommand::Shutdown).await;
    }
}

/// The queue task and its state.
pub struct RetryQueue {
    store: SharedStore,
    store_options: StoreOptions,
    options: QueueOptions,
    transport: SharedTransport,
    url: String,
    user_agent: String,
    pending: Vec<(Instant, QueueItem)>,
    rx: mpsc::Receiver<QueueCommand>,
}

impl RetryQueue {
    /// Start the queue task. Items persisted by an earlier run are
    /// reloaded and become due immediately, keeping their attempt
    /// counts.
    pub fn spawn(
        store: SharedStore,
        store_options: StoreOptions,
        options: QueueOptions,
        transport: SharedTransport,
        url: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> QueueHandle {
        let (tx, rx) = mpsc::channel(64);
        let mut queue = Self {
            store,
            store_options,
            options,
            transport,
            url: url.into(),
            user_agent: user_agent.into(),
            pending: Vec::new(),
            rx,
        };

        queue.reload_persisted();
        tokio::spawn(async move { queue.run().await });
        QueueHandle { tx }
    }

    fn reload_persisted(&mut self) {
        let now = Instant::now();
        for key in self.store.keys_with_prefix(QUEUE_KEY_PREFIX) {
            let Some(raw) = self.store.get(&key) else { continue };
            match serde_json::from_str::<QueueItem>(&raw) {
                Ok(item) => {
                    debug!(id = %item.id, attempts = item.attempts, "reloaded queued event");
                    self.pending.push((now, item));
                }
                Err(_) => self.store.remove(&key),
            }
        }
        if !self.pending.is_empty() {
            info!(count = self.pending.len(), "reloaded persisted queue items");
        }
    }

    async fn run(mut self) {
        loop {
            let next_due = self.pending.iter().map(|(due, _)| *due).min();

            let command = match next_due {
                Some(due) => {
                    tokio::select! {
                        command = self.rx.recv() => command,
                        () = tokio::time::sleep_until(due) => {
                            self.process_due().await;
                            continue;
                        }
                    }
                }
                None => self.rx.recv().await,
            };

            match command {
                Some(QueueCommand::Add(payload)) => self.enqueue(*payload),
                Some(QueueCommand::Shutdown) | None => break,
            }
        }
        debug!("retry queue stopped");
    }

    fn enqueue(&mut self, payload: Payload) {
        if self.pending.len() >= self.options.max_items {
            // evict the oldest so fresh events keep flowing
            let oldest = self
                .pending
                .iter()
                .enumerate()
                .min_by_key(|(_, (_, item))| item.queued_at.clone())
                .map(|(index, _)| index);
            if let Some(index) = oldest {
                let (_, evicted) = self.pending.remove(index);
                warn!(id = %evicted.id, "queue full, evicting oldest item");
                self.store.remove(&evicted.store_key());
            }
        }

        let item = QueueItem::new(payload);
        item.persist(self.store.as_ref(), &self.store_options);
        self.pending.push((Instant::now(), item));
    }

    async fn process_due(&mut self) {
        let now = Instant::now();
        let due: Vec<QueueItem> = {
            let mut due = Vec::new();
            let mut index = 0;
            while index < self.pending.len() {
                if self.pending[index].0 <= now {
                    due.push(self.pending.remove(index).1);
                } else {
                    index += 1;
                }
            }
            due
        };

        for item in due {
            self.attempt(item).await;
        }
    }

    async fn attempt(&mut self, mut item: QueueItem) {
        if is_bot_user_agent(&self.user_agent) {
            debug!(id = %item.id, "crawler user agent, acknowledging without delivery");
            self.store.remove(&item.store_key());
            return;
        }

        item.stamp_sent_at();
        item.attempts += 1;
        item.persist(self.store.as_ref(), &self.store_options);

        let body = serde_json::Value::Object(item.payload.clone());
        match self.transport.send(&self.url, Request::post_json(&body)).await {
            Ok(_) => {
                debug!(id = %item.id, attempts = item.attempts, "event delivered");
                self.store.remove(&item.store_key());
            }
            Err(e) => {
                if item.attempts >= self.options.max_attempts {
                    warn!(
                        id = %item.id,
                        attempts = item.attempts,
                        error = %e,
                        "delivery attempts exhausted, dropping event"
                    );
                    self.store.remove(&item.store_key());
                } else {
                    let delay = self.options.retry_delay(item.attempts);
                    debug!(
                        id = %item.id,
                        attempts = item.attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "delivery failed, scheduling retry"
                    );
                    self.pending.push((Instant::now() + delay, item));
                }
            }
        }
    }
}
