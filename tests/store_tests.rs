//! # Storage Tests
//!
//! The same contract checks run against every backend. PostgreSQL checks are skipped when
//! `DATABASE_URL` is not set.

use anyhow::Result;
use chrono::{Duration, NaiveDate, Utc};
use order_intake::dialogue::Stage;
use order_intake::order::Order;
use order_intake::session::{CartLine, Price, Session};
use order_intake::store::file::FileStore;
use order_intake::store::postgres::PgStore;
use order_intake::store::{append_order, OffHoursMessage, Storage};
use std::sync::Arc;
use tempfile::TempDir;

async fn setup_pg_storage() -> Result<Storage> {
    let database_url = std::env::var("DATABASE_URL")?;
    let store = PgStore::connect(&database_url).await?;
    Ok(Storage::from_engine(Arc::new(store)))
}

macro_rules! skip_if_no_db {
    ($test_fn:expr) => {
        match setup_pg_storage().await {
            Ok(storage) => $test_fn(&storage).await,
            Err(_) => {
                eprintln!("Skipping test: Database not available");
                Ok(())
            }
        }
    };
}

/// Customer ids unique per run so reruns against a real database do not collide
fn customer(tag: &str) -> String {
    format!("{tag}-{}@telegram", Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

async fn check_sessions(storage: &Storage) -> Result<()> {
    let id = customer("session");
    let now = Utc::now();

    assert!(storage.sessions.get(&id).await?.is_none());

    let fresh = storage.sessions.get_or_create(&id, now).await?;
    assert_eq!(fresh.stage, Stage::Initial);
    // get_or_create does not persist
    assert!(storage.sessions.get(&id).await?.is_none());

    let mut session = Session::new(&id, now);
    session.stage = Stage::Cart;
    session.cart.push(CartLine::new("Caneca de Porcelana 325ml", Price::from_cents(3500), 2));
    storage.sessions.put(&session).await?;

    let stored = storage.sessions.get(&id).await?.expect("session should be stored");
    assert_eq!(stored.stage, Stage::Cart);
    assert_eq!(stored.cart_total(), Price::from_cents(7000));

    session.stage = Stage::CartConfirm;
    storage.sessions.put(&session).await?;
    assert_eq!(storage.sessions.get(&id).await?.map(|s| s.stage), Some(Stage::CartConfirm));

    assert!(storage
        .sessions
        .list_all()
        .await?
        .iter()
        .any(|s| s.customer_id == id));

    assert!(storage.sessions.delete(&id).await?);
    assert!(!storage.sessions.delete(&id).await?);
    assert!(storage.sessions.get(&id).await?.is_none());
    Ok(())
}

async fn check_orders(storage: &Storage) -> Result<()> {
    let id = customer("orders");
    let now = Utc::now();
    let date = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
    let lines = vec![CartLine::new("Mouse Pad Personalizado", Price::from_cents(2300), 3)];

    let first = append_order(storage.orders.as_ref(), &id, lines.clone(), "Ana", now, date).await?;
    let second = append_order(
        storage.orders.as_ref(),
        &id,
        lines.clone(),
        "Ana",
        now + Duration::minutes(5),
        date,
    )
    .await?;
    assert_ne!(first.id, second.id);
    assert_eq!(first.total, Price::from_cents(6900));

    let found = storage
        .orders
        .find_by_id(&first.id.to_lowercase())
        .await?
        .expect("lookup should ignore case");
    assert_eq!(found.id, first.id);
    assert_eq!(found.lines, lines);

    let recent = storage.orders.find_by_customer(&id, 1).await?;
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].id, second.id);

    // Taken id is refused
    let duplicate = Order::new(first.id.clone(), &id, lines, "Ana", now);
    assert!(!storage.orders.insert_order(&duplicate).await?);

    assert!(storage.orders.find_by_id("not-an-order").await?.is_none());
    Ok(())
}

async fn check_off_hours_and_whitelist(storage: &Storage) -> Result<()> {
    let id = customer("notes");
    let before = storage.off_hours.count().await?;

    for text in ["primeira", "segunda"] {
        storage
            .off_hours
            .append(&OffHoursMessage {
                customer_id: id.clone(),
                text: text.to_string(),
                received_at: Utc::now(),
            })
            .await?;
    }

    assert_eq!(storage.off_hours.count().await?, before + 2);
    let recent = storage.off_hours.recent(1).await?;
    assert_eq!(recent[0].text, "segunda");

    assert!(!storage.whitelist.contains(&id).await?);
    assert!(storage.whitelist.add(&id).await?);
    assert!(!storage.whitelist.add(&id).await?);
    assert!(storage.whitelist.contains(&id).await?);
    assert!(storage.whitelist.list().await?.contains(&id));
    assert!(storage.whitelist.remove(&id).await?);
    assert!(!storage.whitelist.remove(&id).await?);
    Ok(())
}

async fn check_all(storage: &Storage) -> Result<()> {
    check_sessions(storage).await?;
    check_orders(storage).await?;
    check_off_hours_and_whitelist(storage).await
}

#[tokio::test]
async fn test_memory_store_contract() -> Result<()> {
    check_all(&Storage::in_memory()).await
}

#[tokio::test]
async fn test_file_store_contract() -> Result<()> {
    let dir = TempDir::new()?;
    let storage = Storage::from_engine(Arc::new(FileStore::open(dir.path()).await?));
    check_all(&storage).await
}

#[tokio::test]
async fn test_file_store_survives_reopen() -> Result<()> {
    let dir = TempDir::new()?;
    let now = Utc::now();

    {
        let storage = Storage::from_engine(Arc::new(FileStore::open(dir.path()).await?));
        let mut session = Session::new("77@telegram", now);
        session.stage = Stage::OrderTracking;
        storage.sessions.put(&session).await?;
        storage.whitelist.add("88@telegram").await?;
    }

    let storage = Storage::from_engine(Arc::new(FileStore::open(dir.path()).await?));
    let session = storage.sessions.get("77@telegram").await?.expect("session should survive reopen");
    assert_eq!(session.stage, Stage::OrderTracking);
    assert!(storage.whitelist.contains("88@telegram").await?);
    Ok(())
}

#[tokio::test]
async fn test_file_store_skips_corrupt_session_files() -> Result<()> {
    let dir = TempDir::new()?;
    let storage = Storage::from_engine(Arc::new(FileStore::open(dir.path()).await?));

    storage.sessions.put(&Session::new("1@telegram", Utc::now())).await?;
    std::fs::write(dir.path().join("sessions").join("broken.json"), b"{not json")?;

    let sessions = storage.sessions.list_all().await?;
    assert_eq!(sessions.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_postgres_store_contract() -> Result<()> {
    skip_if_no_db!(check_all)
}
