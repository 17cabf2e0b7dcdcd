//! # Order Module
//!
//! Confirmed quote/order records and their human-readable identifiers.
//!
//! Identifiers have the shape `PED` + `YYMMDD` + three random digits, e.g. `PED261017042`.
//! The date component is the shop's local date at confirmation time.

use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::localization::t;
use crate::session::{cart_total, CartLine, Price};

/// Prefix of every order id
pub const ORDER_ID_PREFIX: &str = "PED";

/// Back-office lifecycle of an order
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Requested,
    Acknowledged,
    InProgress,
    Ready,
    Shipped,
    Delivered,
}

impl OrderStatus {
    pub fn emoji(self) -> &'static str {
        match self {
            OrderStatus::Requested => "🟡",
            OrderStatus::Acknowledged => "🟢",
            OrderStatus::InProgress => "🔧",
            OrderStatus::Ready => "✅",
            OrderStatus::Shipped => "🚚",
            OrderStatus::Delivered => "📦",
        }
    }

    /// Localized label shown to the customer
    pub fn label(self) -> String {
        let key = match self {
            OrderStatus::Requested => "order-status-requested",
            OrderStatus::Acknowledged => "order-status-acknowledged",
            OrderStatus::InProgress => "order-status-in-progress",
            OrderStatus::Ready => "order-status-ready",
            OrderStatus::Shipped => "order-status-shipped",
            OrderStatus::Delivered => "order-status-delivered",
        };
        t(key)
    }
}

/// A confirmed quote, snapshotting the cart at confirmation time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub customer_id: String,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<CartLine>,
    /// Always equal to the sum of the line subtotals
    pub total: Price,
    pub status: OrderStatus,
    pub assigned_agent: String,
}

impl Order {
    /// Build a `Requested` order; the total is derived from `lines`
    pub fn new(
        id: impl Into<String>,
        customer_id: impl Into<String>,
        lines: Vec<CartLine>,
        assigned_agent: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let total = cart_total(&lines);
        Self {
            id: id.into(),
            customer_id: customer_id.into(),
            created_at,
            lines,
            total,
            status: OrderStatus::Requested,
            assigned_agent: assigned_agent.into(),
        }
    }
}

/// Generate `PED<YYMMDD><3 digits>` for the given local date
pub fn generate_order_id<R: Rng>(date: NaiveDate, rng: &mut R) -> String {
    let suffix: u16 = rng.gen_range(0..1000);
    format!("{}{}{:03}", ORDER_ID_PREFIX, date.format("%y%m%d"), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    fn looks_like_order_id(text: &str) -> bool {
        Regex::new(r"(?i)^PED\d{9}$").unwrap().is_match(text.trim())
    }
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generate_order_id_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let date = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();

        for _ in 0..50 {
            let id = generate_order_id(date, &mut rng);
            assert!(id.starts_with("PED260105"), "unexpected id {id}");
            assert_eq!(id.len(), 12);
            assert!(looks_like_order_id(&id));
        }
    }

    #[test]
    fn test_order_total_is_derived_from_lines() {
        let lines = vec![
            CartLine::new("Caneca de Porcelana 325ml", Price::from_cents(3500), 2),
            CartLine::new("Boné Forrado", Price::from_cents(3500), 1),
        ];
        let order = Order::new("PED261017001", "1@telegram", lines, "Ana", Utc::now());

        assert_eq!(order.total, Price::from_cents(10500));
        assert_eq!(order.status, OrderStatus::Requested);
    }

    #[test]
    fn test_looks_like_order_id() {
        assert!(looks_like_order_id("ped261017001"));
        assert!(looks_like_order_id(" PED261017001 "));
        assert!(!looks_like_order_id("PED26101700"));
        assert!(!looks_like_order_id("PEDIDO"));
    }

    #[test]
    fn test_status_emojis_are_distinct() {
        let all = [
            OrderStatus::Requested,
            OrderStatus::Acknowledged,
            OrderStatus::InProgress,
            OrderStatus::Ready,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ];
        let mut emojis: Vec<_> = all.iter().map(|s| s.emoji()).collect();
        emojis.dedup();
        assert_eq!(emojis.len(), all.len());
    }
}
