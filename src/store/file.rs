//! JSON file backend
//!
//! Layout under the data directory:
//!
//! ```text
//! sessions/<customer id>.json   one file per session
//! orders.json                   array of orders, insertion order
//! off_hours.json                array of off-hours messages, insertion order
//! whitelist.json                sorted array of customer ids
//! ```
//!
//! Every write goes to a temporary file in the target directory which is then renamed over
//! the destination, so readers never observe a partially written record.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Write as _;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{OffHoursLog, OffHoursMessage, OrderLedger, SessionStore, WhitelistStore};
use crate::error::StoreError;
use crate::order::Order;
use crate::session::Session;

const SESSIONS_DIR: &str = "sessions";
const ORDERS_FILE: &str = "orders.json";
const OFF_HOURS_FILE: &str = "off_hours.json";
const WHITELIST_FILE: &str = "whitelist.json";

pub struct FileStore {
    dir: PathBuf,
    sessions_dir: PathBuf,
    /// Serializes read-modify-write cycles on the collection files
    collections: Mutex<()>,
}

impl FileStore {
    /// Open (and create if needed) a data directory
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        let sessions_dir = dir.join(SESSIONS_DIR);
        tokio::fs::create_dir_all(&sessions_dir).await?;

        Ok(Self {
            dir,
            sessions_dir,
            collections: Mutex::new(()),
        })
    }

    fn session_path(&self, customer_id: &str) -> PathBuf {
        self.sessions_dir.join(session_file_name(customer_id))
    }

    async fn read_collection<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>, StoreError> {
        Ok(read_json(&self.dir.join(name)).await?.unwrap_or_default())
    }

    async fn write_collection<T: Serialize>(&self, name: &str, items: &[T]) -> Result<(), StoreError> {
        write_json_atomic(self.dir.join(name), items).await
    }
}

/// File name for a customer id; bytes outside a safe set are percent-encoded
fn session_file_name(customer_id: &str) -> String {
    let mut name = String::with_capacity(customer_id.len() + 5);
    for (i, byte) in customer_id.bytes().enumerate() {
        let safe = byte.is_ascii_alphanumeric()
            || matches!(byte, b'-' | b'_' | b'@')
            || (byte == b'.' && i > 0);
        if safe {
            name.push(byte as char);
        } else {
            let _ = write!(name, "%{byte:02X}");
        }
    }
    name.push_str(".json");
    name
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn write_json_atomic<T: Serialize + ?Sized>(path: PathBuf, value: &T) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(value)?;
    let parent = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
        let mut tmp = NamedTempFile::new_in(&parent)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| StoreError::Io(std::io::Error::other(e)))?
}

#[async_trait]
impl SessionStore for FileStore {
    async fn get(&self, customer_id: &str) -> Result<Option<Session>, StoreError> {
        read_json(&self.session_path(customer_id)).await
    }

    async fn put(&self, session: &Session) -> Result<(), StoreError> {
        write_json_atomic(self.session_path(&session.customer_id), session).await
    }

    async fn delete(&self, customer_id: &str) -> Result<bool, StoreError> {
        match tokio::fs::remove_file(self.session_path(customer_id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_all(&self) -> Result<Vec<Session>, StoreError> {
        let mut sessions = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.sessions_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_json::<Session>(&path).await {
                Ok(Some(session)) => sessions.push(session),
                // Deleted between listing and reading
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable session file"),
            }
        }

        debug!(count = sessions.len(), "Listed sessions from disk");
        Ok(sessions)
    }
}

#[async_trait]
impl OrderLedger for FileStore {
    async fn insert_order(&self, order: &Order) -> Result<bool, StoreError> {
        let _guard = self.collections.lock().await;
        let mut orders: Vec<Order> = self.read_collection(ORDERS_FILE).await?;
        if orders.iter().any(|o| o.id.eq_ignore_ascii_case(&order.id)) {
            return Ok(false);
        }
        orders.push(order.clone());
        self.write_collection(ORDERS_FILE, &orders).await?;
        Ok(true)
    }

    async fn find_by_id(&self, order_id: &str) -> Result<Option<Order>, StoreError> {
        let order_id = order_id.trim();
        let orders: Vec<Order> = self.read_collection(ORDERS_FILE).await?;
        Ok(orders
            .into_iter()
            .find(|o| o.id.eq_ignore_ascii_case(order_id)))
    }

    async fn find_by_customer(
        &self,
        customer_id: &str,
        limit: usize,
    ) -> Result<Vec<Order>, StoreError> {
        let mut orders: Vec<Order> = self
            .read_collection::<Order>(ORDERS_FILE)
            .await?
            .into_iter()
            .filter(|o| o.customer_id == customer_id)
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders.truncate(limit);
        Ok(orders)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.read_collection::<Order>(ORDERS_FILE).await?.len())
    }
}

#[async_trait]
impl OffHoursLog for FileStore {
    async fn append(&self, message: &OffHoursMessage) -> Result<(), StoreError> {
        let _guard = self.collections.lock().await;
        let mut messages: Vec<OffHoursMessage> = self.read_collection(OFF_HOURS_FILE).await?;
        messages.push(message.clone());
        self.write_collection(OFF_HOURS_FILE, &messages).await
    }

    async fn recent(&self, limit: usize) -> Result<Vec<OffHoursMessage>, StoreError> {
        let messages: Vec<OffHoursMessage> = self.read_collection(OFF_HOURS_FILE).await?;
        Ok(messages.into_iter().rev().take(limit).collect())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self
            .read_collection::<OffHoursMessage>(OFF_HOURS_FILE)
            .await?
            .len())
    }
}

#[async_trait]
impl WhitelistStore for FileStore {
    async fn contains(&self, customer_id: &str) -> Result<bool, StoreError> {
        let ids: Vec<String> = self.read_collection(WHITELIST_FILE).await?;
        Ok(ids.iter().any(|id| id == customer_id))
    }

    async fn add(&self, customer_id: &str) -> Result<bool, StoreError> {
        let _guard = self.collections.lock().await;
        let mut ids: Vec<String> = self.read_collection(WHITELIST_FILE).await?;
        if ids.iter().any(|id| id == customer_id) {
            return Ok(false);
        }
        ids.push(customer_id.to_string());
        ids.sort();
        self.write_collection(WHITELIST_FILE, &ids).await?;
        Ok(true)
    }

    async fn remove(&self, customer_id: &str) -> Result<bool, StoreError> {
        let _guard = self.collections.lock().await;
        let mut ids: Vec<String> = self.read_collection(WHITELIST_FILE).await?;
        let before = ids.len();
        ids.retain(|id| id != customer_id);
        if ids.len() == before {
            return Ok(false);
        }
        self.write_collection(WHITELIST_FILE, &ids).await?;
        Ok(true)
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        self.read_collection(WHITELIST_FILE).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_file_names_are_safe() {
        assert_eq!(
            session_file_name("5527999990000@s.whatsapp.net"),
            "5527999990000@s.whatsapp.net.json"
        );
        assert_eq!(session_file_name("../etc/passwd"), "%2E.%2Fetc%2Fpasswd.json");
        assert_eq!(session_file_name("a b"), "a%20b.json");
    }
}
