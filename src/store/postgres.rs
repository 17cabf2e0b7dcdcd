//! PostgreSQL backend
//!
//! Sessions and orders are kept as whole JSON documents next to the columns used for
//! lookups, so a write always replaces the complete record.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::info;

use super::{OffHoursLog, OffHoursMessage, OrderLedger, SessionStore, WhitelistStore};
use crate::error::StoreError;
use crate::order::Order;
use crate::session::Session;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and make sure the schema exists
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create tables and indexes if they do not exist
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        info!("Initializing database schema...");

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sessions (
                customer_id TEXT PRIMARY KEY,
                stage TEXT NOT NULL,
                last_interaction_at TIMESTAMPTZ NOT NULL,
                data TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS orders (
                id TEXT PRIMARY KEY,
                customer_id TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                data TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS orders_customer_created_idx
             ON orders (customer_id, created_at DESC)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS off_hours_messages (
                id BIGSERIAL PRIMARY KEY,
                customer_id TEXT NOT NULL,
                text TEXT NOT NULL,
                received_at TIMESTAMPTZ NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS whitelist (
                customer_id TEXT PRIMARY KEY,
                added_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
        )
        .execute(&self.pool)
        .await?;

        info!("Database schema initialized successfully");
        Ok(())
    }
}

fn stage_name(session: &Session) -> Result<String, StoreError> {
    let value = serde_json::to_value(session.stage)?;
    Ok(value.as_str().unwrap_or_default().to_string())
}

#[async_trait]
impl SessionStore for PgStore {
    async fn get(&self, customer_id: &str) -> Result<Option<Session>, StoreError> {
        let row = sqlx::query("SELECT data FROM sessions WHERE customer_id = $1")
            .bind(customer_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let data: String = row.try_get("data")?;
                Ok(Some(serde_json::from_str(&data)?))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, session: &Session) -> Result<(), StoreError> {
        let data = serde_json::to_string(session)?;
        sqlx::query(
            "INSERT INTO sessions (customer_id, stage, last_interaction_at, data)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (customer_id) DO UPDATE
             SET stage = EXCLUDED.stage,
                 last_interaction_at = EXCLUDED.last_interaction_at,
                 data = EXCLUDED.data",
        )
        .bind(&session.customer_id)
        .bind(stage_name(session)?)
        .bind(session.last_interaction_at)
        .bind(data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, customer_id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE customer_id = $1")
            .bind(customer_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_all(&self) -> Result<Vec<Session>, StoreError> {
        let rows = sqlx::query("SELECT data FROM sessions ORDER BY last_interaction_at DESC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<Session, StoreError> {
                let data: String = row.try_get("data")?;
                Ok(serde_json::from_str(&data)?)
            })
            .collect()
    }
}

#[async_trait]
impl OrderLedger for PgStore {
    async fn insert_order(&self, order: &Order) -> Result<bool, StoreError> {
        let data = serde_json::to_string(order)?;
        let result = sqlx::query(
            "INSERT INTO orders (id, customer_id, created_at, data)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(order.id.to_uppercase())
        .bind(&order.customer_id)
        .bind(order.created_at)
        .bind(data)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn find_by_id(&self, order_id: &str) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query("SELECT data FROM orders WHERE id = $1")
            .bind(order_id.trim().to_uppercase())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let data: String = row.try_get("data")?;
                Ok(Some(serde_json::from_str(&data)?))
            }
            None => Ok(None),
        }
    }

    async fn find_by_customer(
        &self,
        customer_id: &str,
        limit: usize,
    ) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(
            "SELECT data FROM orders WHERE customer_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(customer_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<Order, StoreError> {
                let data: String = row.try_get("data")?;
                Ok(serde_json::from_str(&data)?)
            })
            .collect()
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}

#[async_trait]
impl OffHoursLog for PgStore {
    async fn append(&self, message: &OffHoursMessage) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO off_hours_messages (customer_id, text, received_at) VALUES ($1, $2, $3)",
        )
        .bind(&message.customer_id)
        .bind(&message.text)
        .bind(message.received_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<OffHoursMessage>, StoreError> {
        let rows = sqlx::query(
            "SELECT customer_id, text, received_at FROM off_hours_messages
             ORDER BY id DESC LIMIT $1",
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<OffHoursMessage, StoreError> {
                let received_at: DateTime<Utc> = row.try_get("received_at")?;
                Ok(OffHoursMessage {
                    customer_id: row.try_get("customer_id")?,
                    text: row.try_get("text")?,
                    received_at,
                })
            })
            .collect()
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM off_hours_messages")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}

#[async_trait]
impl WhitelistStore for PgStore {
    async fn contains(&self, customer_id: &str) -> Result<bool, StoreError> {
        let found: Option<String> =
            sqlx::query_scalar("SELECT customer_id FROM whitelist WHERE customer_id = $1")
                .bind(customer_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    async fn add(&self, customer_id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT INTO whitelist (customer_id) VALUES ($1) ON CONFLICT (customer_id) DO NOTHING",
        )
        .bind(customer_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn remove(&self, customer_id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM whitelist WHERE customer_id = $1")
            .bind(customer_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT customer_id FROM whitelist ORDER BY customer_id")
                .fetch_all(&self.pool)
                .await?;
        Ok(ids)
    }
}
