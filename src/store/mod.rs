//! # Storage Module
//!
//! Persistence contracts for the bot and their backends.
//!
//! Every record is serialized and replaced as a whole on write, so a concurrent reader sees
//! either the previous or the next version of a session, never a mix of both. Backends:
//!
//! - [`memory::MemoryStore`]: process-local maps, used in tests and with `STORAGE_BACKEND=memory`
//! - [`file::FileStore`]: one JSON file per session plus one JSON file per collection
//! - [`postgres::PgStore`]: PostgreSQL through `sqlx`

pub mod file;
pub mod memory;
pub mod postgres;

use anyhow::{Context, Result as AnyResult};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::StorageBackend;
use crate::error::StoreError;
use crate::order::{generate_order_id, Order};
use crate::session::{CartLine, Session};

/// How many ids are tried before giving up on an order
pub const MAX_ORDER_ID_ATTEMPTS: u32 = 10;

/// Durable mapping from customer id to session
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, customer_id: &str) -> Result<Option<Session>, StoreError>;

    /// Insert or replace the whole session record
    async fn put(&self, session: &Session) -> Result<(), StoreError>;

    /// Returns whether a session was removed
    async fn delete(&self, customer_id: &str) -> Result<bool, StoreError>;

    async fn list_all(&self) -> Result<Vec<Session>, StoreError>;

    /// Stored session, or a fresh one in the initial stage; the fresh one is not persisted
    async fn get_or_create(
        &self,
        customer_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Session, StoreError> {
        Ok(self
            .get(customer_id)
            .await?
            .unwrap_or_else(|| Session::new(customer_id, now)))
    }
}

/// Append-only collection of confirmed orders
#[async_trait]
pub trait OrderLedger: Send + Sync {
    /// Store `order` unless its id is already taken; returns whether it was stored
    async fn insert_order(&self, order: &Order) -> Result<bool, StoreError>;

    /// Case-insensitive exact id lookup
    async fn find_by_id(&self, order_id: &str) -> Result<Option<Order>, StoreError>;

    /// Most recent first
    async fn find_by_customer(
        &self,
        customer_id: &str,
        limit: usize,
    ) -> Result<Vec<Order>, StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;
}

/// A message received while the shop was closed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffHoursMessage {
    pub customer_id: String,
    pub text: String,
    pub received_at: DateTime<Utc>,
}

/// Append-only log of off-hours messages, read for manual follow-up
#[async_trait]
pub trait OffHoursLog: Send + Sync {
    async fn append(&self, message: &OffHoursMessage) -> Result<(), StoreError>;

    /// Most recent first
    async fn recent(&self, limit: usize) -> Result<Vec<OffHoursMessage>, StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;
}

/// Customers excluded from automated handling
#[async_trait]
pub trait WhitelistStore: Send + Sync {
    async fn contains(&self, customer_id: &str) -> Result<bool, StoreError>;

    /// Returns whether the id was newly added
    async fn add(&self, customer_id: &str) -> Result<bool, StoreError>;

    /// Returns whether the id was present
    async fn remove(&self, customer_id: &str) -> Result<bool, StoreError>;

    /// Sorted ids
    async fn list(&self) -> Result<Vec<String>, StoreError>;
}

/// The four stores the bot works with, usually backed by the same engine
#[derive(Clone)]
pub struct Storage {
    pub sessions: Arc<dyn SessionStore>,
    pub orders: Arc<dyn OrderLedger>,
    pub off_hours: Arc<dyn OffHoursLog>,
    pub whitelist: Arc<dyn WhitelistStore>,
}

impl Storage {
    /// Use one engine for every store
    pub fn from_engine<S>(engine: Arc<S>) -> Self
    where
        S: SessionStore + OrderLedger + OffHoursLog + WhitelistStore + 'static,
    {
        Self {
            sessions: engine.clone(),
            orders: engine.clone(),
            off_hours: engine.clone(),
            whitelist: engine,
        }
    }

    pub fn in_memory() -> Self {
        Self::from_engine(Arc::new(memory::MemoryStore::new()))
    }

    /// Open the configured backend, creating directories or tables as needed
    pub async fn open(backend: &StorageBackend) -> AnyResult<Self> {
        match backend {
            StorageBackend::Memory => {
                warn!("Using in-memory storage, state is lost on restart");
                Ok(Self::in_memory())
            }
            StorageBackend::File { dir } => {
                let store = file::FileStore::open(dir)
                    .await
                    .with_context(|| format!("Failed to open data directory {}", dir.display()))?;
                info!(data_dir = %dir.display(), "Using JSON file storage");
                Ok(Self::from_engine(Arc::new(store)))
            }
            StorageBackend::Postgres { url } => {
                let store = postgres::PgStore::connect(url)
                    .await
                    .context("Failed to connect to PostgreSQL")?;
                info!("Using PostgreSQL storage");
                Ok(Self::from_engine(Arc::new(store)))
            }
        }
    }
}

/// Snapshot `lines` into a new order under a fresh, unused id
///
/// `local_date` supplies the date component of the id. Collisions with existing ids are
/// retried up to [`MAX_ORDER_ID_ATTEMPTS`] times.
pub async fn append_order(
    ledger: &dyn OrderLedger,
    customer_id: &str,
    lines: Vec<CartLine>,
    assigned_agent: &str,
    now: DateTime<Utc>,
    local_date: NaiveDate,
) -> Result<Order, StoreError> {
    let mut order = Order::new(String::new(), customer_id, lines, assigned_agent, now);

    for attempt in 1..=MAX_ORDER_ID_ATTEMPTS {
        order.id = generate_order_id(local_date, &mut rand::thread_rng());
        if ledger.insert_order(&order).await? {
            return Ok(order);
        }
        warn!(order_id = %order.id, attempt, "Order id collision, retrying");
    }

    Err(StoreError::OrderIdExhausted(MAX_ORDER_ID_ATTEMPTS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Price;

    #[tokio::test]
    async fn test_append_order_assigns_unique_ids() {
        let storage = Storage::in_memory();
        let date = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        let lines = vec![CartLine::new("Xícara 180ml", Price::from_cents(3500), 1)];

        let mut ids = std::collections::HashSet::new();
        for _ in 0..20 {
            let order = append_order(
                storage.orders.as_ref(),
                "1@telegram",
                lines.clone(),
                "Ana",
                Utc::now(),
                date,
            )
            .await
            .unwrap();
            assert!(order.id.starts_with("PED261017"));
            assert!(ids.insert(order.id));
        }
        assert_eq!(storage.orders.count().await.unwrap(), 20);
    }

    #[tokio::test]
    async fn test_get_or_create_does_not_persist() {
        let storage = Storage::in_memory();
        let session = storage
            .sessions
            .get_or_create("1@telegram", Utc::now())
            .await
            .unwrap();

        assert_eq!(session.customer_id, "1@telegram");
        assert!(storage.sessions.get("1@telegram").await.unwrap().is_none());
    }
}
