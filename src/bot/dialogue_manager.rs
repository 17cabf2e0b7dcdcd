//! Dialogue Manager module: runs one inbound turn end to end
//!
//! Owns everything around the state machine: per-customer serialization, allow-list and
//! admin routing, operator echo detection, loading and persisting the session, and
//! handing replies to the outbound scheduler.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info};

use crate::admin::{parse_admin_command, Admin};
use crate::catalog::Catalog;
use crate::config::BotConfig;
use crate::conversation::{Conversation, TurnContext};
use crate::dialogue::InboundText;
use crate::error::StoreError;
use crate::messages;
use crate::outbound::Outbound;
use crate::scheduler::OutboundScheduler;
use crate::store::Storage;

/// Lock map entries are pruned once the map grows past this size
const LOCK_PRUNE_THRESHOLD: usize = 1024;

/// One inbound message, already normalized by the transport adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub customer_id: String,
    /// Typed text or the id of a picked menu option
    pub text: String,
    /// Sent from the business account itself, by the bot or by a human operator
    pub is_self_sent: bool,
    /// Transport message id, used to recognize the bot's own echoes
    pub message_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl InboundEvent {
    pub fn from_customer(customer_id: impl Into<String>, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            customer_id: customer_id.into(),
            text: text.into(),
            is_self_sent: false,
            message_id: None,
            timestamp,
        }
    }
}

pub struct DialogueManager {
    config: Arc<BotConfig>,
    catalog: Arc<Catalog>,
    storage: Storage,
    scheduler: Arc<OutboundScheduler>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    started_at: DateTime<Utc>,
}

impl DialogueManager {
    pub fn new(
        config: Arc<BotConfig>,
        catalog: Arc<Catalog>,
        storage: Storage,
        scheduler: Arc<OutboundScheduler>,
    ) -> Self {
        Self {
            config,
            catalog,
            storage,
            scheduler,
            locks: Mutex::new(HashMap::new()),
            started_at: Utc::now(),
        }
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn scheduler(&self) -> &Arc<OutboundScheduler> {
        &self.scheduler
    }

    fn customer_lock(&self, customer_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = match self.locks.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        };

        if locks.len() > LOCK_PRUNE_THRESHOLD {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }

        locks
            .entry(customer_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Process one inbound event and queue its replies; never fails
    pub async fn handle_inbound(&self, event: InboundEvent) {
        match self.turn(&event).await {
            Ok(replies) => self.scheduler.enqueue(&event.customer_id, replies),
            Err(e) => {
                error!(
                    customer_id = %event.customer_id,
                    error = %e,
                    "Turn failed, session left unchanged"
                );
                let reply = messages::generic_error(&self.config.shop).rendered(self.config.render_mode);
                self.scheduler.enqueue(&event.customer_id, vec![reply]);
            }
        }
    }

    /// Run one turn and return its replies without queueing them
    ///
    /// The stored session is only replaced when the whole turn succeeds.
    pub async fn turn(&self, event: &InboundEvent) -> Result<Vec<Outbound>, StoreError> {
        let lock = self.customer_lock(&event.customer_id);
        let _guard = lock.lock().await;

        let customer_id = event.customer_id.as_str();
        let now = event.timestamp;

        if event.is_self_sent {
            return self.self_sent(event).await;
        }

        if !self.config.is_allowed(customer_id) {
            debug!(customer_id, "Customer not in allow-list, ignoring");
            return Ok(Vec::new());
        }

        let is_admin = self.config.is_admin(customer_id);
        if is_admin {
            if let Some(command) = parse_admin_command(&event.text) {
                // Serialize with the target's own turns so neither write is lost
                let target_lock = command
                    .target_customer()
                    .filter(|target| *target != customer_id)
                    .map(|target| self.customer_lock(target));
                let _target_guard = match &target_lock {
                    Some(lock) => Some(lock.lock().await),
                    None => None,
                };

                let admin = Admin::new(&self.config, &self.catalog, &self.storage, self.started_at);
                return Ok(vec![admin.execute(customer_id, &command, now).await?]);
            }
        }

        let whitelisted = !is_admin && self.storage.whitelist.contains(customer_id).await?;

        let stored = self.storage.sessions.get_or_create(customer_id, now).await?;
        let mut session = stored.clone();

        let local_now = now.with_timezone(&self.config.utc_offset);
        let ctx = TurnContext {
            now,
            is_open: self.config.schedule.is_open_at(&local_now),
            whitelisted,
        };

        debug!(
            customer_id,
            stage = ?session.stage,
            text_len = event.text.len(),
            is_open = ctx.is_open,
            "Inbound message"
        );

        let conversation = Conversation::new(
            &self.config,
            &self.catalog,
            self.storage.orders.as_ref(),
            self.storage.off_hours.as_ref(),
        );
        let replies = conversation
            .step(&mut session, &InboundText::new(&event.text), &ctx)
            .await?;

        if session != stored {
            self.storage.sessions.put(&session).await?;
        }

        Ok(replies)
    }

    async fn self_sent(&self, event: &InboundEvent) -> Result<Vec<Outbound>, StoreError> {
        let echo = event
            .message_id
            .as_deref()
            .is_some_and(|id| self.scheduler.sent_registry().contains(id));
        if echo {
            return Ok(Vec::new());
        }

        let mut session = self
            .storage
            .sessions
            .get_or_create(&event.customer_id, event.timestamp)
            .await?;
        if !session.human_override_active {
            session.human_override_active = true;
            self.storage.sessions.put(&session).await?;
            info!(customer_id = %event.customer_id, "Human operator took over the conversation");
        }

        Ok(Vec::new())
    }
}
