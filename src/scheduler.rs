//! # Outbound Scheduler
//!
//! Single FIFO queue between the conversation and the transport. One background task
//! drains it: each message waits a human-like delay picked from its category, is checked
//! against the per-customer rate limiter, then handed to the [`Messenger`].
//!
//! - Blocked by the limiter: the message and every later message for the same customer move
//!   to the tail together, so per-customer order is kept.
//! - Transport rate limit: the message goes back to the head and the whole queue cools down.
//! - Any other transport error: logged, message dropped.
//!
//! With anti-abuse disabled messages are sent back to back with no limiter.

use rand::Rng;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::config::{BotConfig, DelayRange, PacingConfig};
use crate::outbound::{Messenger, Outbound, SendCategory, SentMessageId};
use crate::rate_limiter::RateLimiter;

/// How many sent message ids are remembered for echo detection
pub const SENT_REGISTRY_CAPACITY: usize = 10_000;

/// Ids of messages the bot itself delivered
///
/// Used to tell the bot's own echoes apart from messages a human operator typed from the
/// business account. Oldest ids are forgotten first once the capacity is reached.
#[derive(Debug, Default)]
pub struct SentRegistry {
    inner: Mutex<RegistryInner>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    ids: HashSet<SentMessageId>,
    order: VecDeque<SentMessageId>,
}

impl SentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        match self.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn record(&self, id: SentMessageId) {
        let mut inner = self.lock();
        if !inner.ids.insert(id.clone()) {
            return;
        }
        inner.order.push_back(id);
        while inner.order.len() > SENT_REGISTRY_CAPACITY {
            if let Some(oldest) = inner.order.pop_front() {
                inner.ids.remove(&oldest);
            }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.lock().ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
struct QueuedMessage {
    customer_id: String,
    outbound: Outbound,
}

pub struct OutboundScheduler {
    queue: Mutex<VecDeque<QueuedMessage>>,
    notify: Notify,
    messenger: Arc<dyn Messenger>,
    limiter: RateLimiter,
    pacing: PacingConfig,
    anti_abuse: bool,
    sent: Arc<SentRegistry>,
}

impl OutboundScheduler {
    pub fn new(messenger: Arc<dyn Messenger>, config: &BotConfig, sent: Arc<SentRegistry>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            messenger,
            limiter: RateLimiter::new(config.rate_limit.clone()),
            pacing: config.pacing.clone(),
            anti_abuse: config.anti_abuse,
            sent,
        }
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<QueuedMessage>> {
        match self.queue.lock() {
            Ok(queue) => queue,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Append replies for one customer to the tail of the queue
    pub fn enqueue(&self, customer_id: &str, messages: Vec<Outbound>) {
        if messages.is_empty() {
            return;
        }

        {
            let mut queue = self.queue();
            for outbound in messages {
                queue.push_back(QueuedMessage {
                    customer_id: customer_id.to_string(),
                    outbound,
                });
            }
            debug!(customer_id, pending = queue.len(), "Messages queued");
        }

        self.notify.notify_one();
    }

    /// Messages waiting to be sent
    pub fn pending(&self) -> usize {
        self.queue().len()
    }

    pub fn sent_registry(&self) -> &Arc<SentRegistry> {
        &self.sent
    }

    /// Drain the queue forever; spawn this once per process
    pub async fn run(self: Arc<Self>) {
        info!(anti_abuse = self.anti_abuse, "Outbound scheduler started");

        loop {
            let notified = self.notify.notified();
            let next = self.queue().pop_front();

            match next {
                Some(message) => self.process(message).await,
                None => {
                    self.limiter.purge_idle();
                    notified.await;
                }
            }
        }
    }

    async fn process(&self, message: QueuedMessage) {
        if self.anti_abuse && !self.limiter.can_send(&message.customer_id) {
            debug!(customer_id = %message.customer_id, "Rate limited, deferring message");
            self.defer(message);
            tokio::time::sleep(self.pacing.requeue_delay).await;
            return;
        }

        if self.anti_abuse {
            let delay = pick_delay(&self.pacing, message.outbound.category, &mut rand::thread_rng());
            tokio::time::sleep(delay).await;
        }

        match self
            .messenger
            .send(&message.customer_id, &message.outbound.payload)
            .await
        {
            Ok(id) => {
                self.sent.record(id);
                if self.anti_abuse {
                    self.limiter.record_send(&message.customer_id);
                }
                debug!(customer_id = %message.customer_id, category = ?message.outbound.category, "Message sent");
            }
            Err(e) if e.is_rate_limit() => {
                warn!(
                    customer_id = %message.customer_id,
                    error = %e,
                    cooldown_secs = self.pacing.transport_cooldown.as_secs(),
                    "Transport rate limit, pausing outbound queue"
                );
                self.queue().push_front(message);
                tokio::time::sleep(self.pacing.transport_cooldown).await;
            }
            Err(e) => {
                error!(customer_id = %message.customer_id, error = %e, "Failed to send message, dropping it");
            }
        }
    }

    /// Move `message` and every queued message for the same customer to the tail
    fn defer(&self, message: QueuedMessage) {
        let mut queue = self.queue();
        let customer_id = message.customer_id.clone();
        let (same, rest): (VecDeque<_>, VecDeque<_>) = queue
            .drain(..)
            .partition(|queued| queued.customer_id == customer_id);

        *queue = rest;
        queue.push_back(message);
        queue.extend(same);
    }
}

fn draw<R: Rng>(range: DelayRange, rng: &mut R) -> u64 {
    if range.max_ms <= range.min_ms {
        range.min_ms
    } else {
        rng.gen_range(range.min_ms..=range.max_ms)
    }
}

/// Human-like delay before sending a message of `category`
pub fn pick_delay<R: Rng>(pacing: &PacingConfig, category: SendCategory, rng: &mut R) -> Duration {
    let base = match category {
        SendCategory::Menu => pacing.menu,
        SendCategory::Text => pacing.text,
        SendCategory::Complex => pacing.complex,
        SendCategory::Error => pacing.error,
    };

    let mut millis = draw(base, rng);

    if pacing.extended_pause_probability > 0.0 && rng.gen_bool(pacing.extended_pause_probability.min(1.0)) {
        millis += draw(pacing.extended_pause, rng);
    }

    if pacing.jitter_probability > 0.0 && rng.gen_bool(pacing.jitter_probability.min(1.0)) {
        millis += draw(pacing.jitter, rng);
    }

    Duration::from_millis(millis)
}
