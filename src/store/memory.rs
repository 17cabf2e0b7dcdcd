//! In-memory backend for every store trait

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;

use super::{OffHoursLog, OffHoursMessage, OrderLedger, SessionStore, WhitelistStore};
use crate::error::StoreError;
use crate::order::Order;
use crate::session::Session;

#[derive(Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<String, Session>>,
    orders: RwLock<Vec<Order>>,
    off_hours: RwLock<Vec<OffHoursMessage>>,
    whitelist: RwLock<BTreeSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, customer_id: &str) -> Result<Option<Session>, StoreError> {
        Ok(self.sessions.read().await.get(customer_id).cloned())
    }

    async fn put(&self, session: &Session) -> Result<(), StoreError> {
        self.sessions
            .write()
            .await
            .insert(session.customer_id.clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, customer_id: &str) -> Result<bool, StoreError> {
        Ok(self.sessions.write().await.remove(customer_id).is_some())
    }

    async fn list_all(&self) -> Result<Vec<Session>, StoreError> {
        Ok(self.sessions.read().await.values().cloned().collect())
    }
}

#[async_trait]
impl OrderLedger for MemoryStore {
    async fn insert_order(&self, order: &Order) -> Result<bool, StoreError> {
        let mut orders = self.orders.write().await;
        if orders.iter().any(|o| o.id.eq_ignore_ascii_case(&order.id)) {
            return Ok(false);
        }
        orders.push(order.clone());
        Ok(true)
    }

    async fn find_by_id(&self, order_id: &str) -> Result<Option<Order>, StoreError> {
        let order_id = order_id.trim();
        Ok(self
            .orders
            .read()
            .await
            .iter()
            .find(|o| o.id.eq_ignore_ascii_case(order_id))
            .cloned())
    }

    async fn find_by_customer(
        &self,
        customer_id: &str,
        limit: usize,
    ) -> Result<Vec<Order>, StoreError> {
        let mut orders: Vec<Order> = self
            .orders
            .read()
            .await
            .iter()
            .filter(|o| o.customer_id == customer_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders.truncate(limit);
        Ok(orders)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.orders.read().await.len())
    }
}

#[async_trait]
impl OffHoursLog for MemoryStore {
    async fn append(&self, message: &OffHoursMessage) -> Result<(), StoreError> {
        self.off_hours.write().await.push(message.clone());
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<OffHoursMessage>, StoreError> {
        Ok(self
            .off_hours
            .read()
            .await
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.off_hours.read().await.len())
    }
}

#[async_trait]
impl WhitelistStore for MemoryStore {
    async fn contains(&self, customer_id: &str) -> Result<bool, StoreError> {
        Ok(self.whitelist.read().await.contains(customer_id))
    }

    async fn add(&self, customer_id: &str) -> Result<bool, StoreError> {
        Ok(self.whitelist.write().await.insert(customer_id.to_string()))
    }

    async fn remove(&self, customer_id: &str) -> Result<bool, StoreError> {
        Ok(self.whitelist.write().await.remove(customer_id))
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.whitelist.read().await.iter().cloned().collect())
    }
}
