//! # Session Model
//!
//! Per-customer conversation state: current stage, cart, pending product selection
//! and the bookkeeping read by the background sweeps.
//!
//! ## Usage
//!
//! ```rust
//! use chrono::Utc;
//! use order_intake::session::{CartLine, Price, Session};
//!
//! let mut session = Session::new("5527999990000@s.whatsapp.net", Utc::now());
//! session.cart.push(CartLine::new("Caneca de Porcelana 325ml", Price::from_cents(3500), 2));
//! assert_eq!(session.cart_total(), Price::from_cents(7000));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Mul};

use crate::dialogue::Stage;

/// Monetary amount in integer cents (BRL)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(u64);

impl Price {
    pub const ZERO: Price = Price(0);

    pub const fn from_cents(cents: u64) -> Self {
        Price(cents)
    }

    pub const fn cents(self) -> u64 {
        self.0
    }
}

/// Formats as `35.00`, without currency symbol
impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Add for Price {
    type Output = Price;

    fn add(self, rhs: Price) -> Price {
        Price(self.0 + rhs.0)
    }
}

impl Mul<u32> for Price {
    type Output = Price;

    fn mul(self, rhs: u32) -> Price {
        Price(self.0 * u64::from(rhs))
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Price>>(iter: I) -> Price {
        iter.fold(Price::ZERO, Add::add)
    }
}

/// One product/quantity selection in a cart or order snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_name: String,
    pub unit_price: Price,
    /// Always >= 1
    pub quantity: u32,
}

impl CartLine {
    pub fn new(product_name: impl Into<String>, unit_price: Price, quantity: u32) -> Self {
        Self {
            product_name: product_name.into(),
            unit_price,
            quantity: quantity.max(1),
        }
    }

    pub fn subtotal(&self) -> Price {
        self.unit_price * self.quantity
    }
}

/// Sum of `unit_price * quantity` over all lines
pub fn cart_total(lines: &[CartLine]) -> Price {
    lines.iter().map(CartLine::subtotal).sum()
}

/// Conversation state for one customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque customer identifier, e.g. `5527999990000@s.whatsapp.net` or `123456@telegram`
    pub customer_id: String,
    pub stage: Stage,
    pub cart: Vec<CartLine>,
    /// Product awaiting a quantity; only set while in `ProductQuantity`
    pub selected_product: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_interaction_at: DateTime<Utc>,
    pub nudge_count: u32,
    pub last_nudge_at: Option<DateTime<Utc>>,
    pub nudge_exhausted: bool,
    /// Set when a human operator answered through the same channel
    pub human_override_active: bool,
}

impl Session {
    /// Fresh session in the initial stage
    pub fn new(customer_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            customer_id: customer_id.into(),
            stage: Stage::Initial,
            cart: Vec::new(),
            selected_product: None,
            created_at: now,
            last_interaction_at: now,
            nudge_count: 0,
            last_nudge_at: None,
            nudge_exhausted: false,
            human_override_active: false,
        }
    }

    pub fn cart_total(&self) -> Price {
        cart_total(&self.cart)
    }

    /// Clear re-engagement bookkeeping after an explicit return to the menu
    pub fn reset_nudges(&mut self) {
        self.nudge_count = 0;
        self.last_nudge_at = None;
        self.nudge_exhausted = false;
    }

    /// The later of the last inbound message and the last nudge
    pub fn last_activity_at(&self) -> DateTime<Utc> {
        match self.last_nudge_at {
            Some(nudged) if nudged > self.last_interaction_at => nudged,
            _ => self.last_interaction_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_price_display() {
        assert_eq!(Price::from_cents(3500).to_string(), "35.00");
        assert_eq!(Price::from_cents(2305).to_string(), "23.05");
        assert_eq!(Price::ZERO.to_string(), "0.00");
    }

    #[test]
    fn test_cart_total_matches_line_sum() {
        let lines = vec![
            CartLine::new("Caneca de Porcelana 325ml", Price::from_cents(3500), 2),
            CartLine::new("Mouse Pad Personalizado", Price::from_cents(2300), 3),
        ];
        assert_eq!(cart_total(&lines), Price::from_cents(7000 + 6900));
        assert_eq!(cart_total(&[]), Price::ZERO);
    }

    #[test]
    fn test_cart_line_quantity_floor() {
        let line = CartLine::new("Xícara 180ml", Price::from_cents(3500), 0);
        assert_eq!(line.quantity, 1);
    }

    #[test]
    fn test_last_activity_prefers_later_nudge() {
        let now = Utc::now();
        let mut session = Session::new("1@telegram", now);
        assert_eq!(session.last_activity_at(), now);

        session.last_nudge_at = Some(now + Duration::minutes(5));
        assert_eq!(session.last_activity_at(), now + Duration::minutes(5));

        session.last_nudge_at = Some(now - Duration::minutes(5));
        assert_eq!(session.last_activity_at(), now);
    }

    #[test]
    fn test_session_serialization_roundtrip() {
        let mut session = Session::new("1@telegram", Utc::now());
        session.stage = Stage::Cart;
        session.cart.push(CartLine::new("Ecobag Personalizada", Price::from_cents(3500), 1));

        let json = serde_json::to_string(&session).unwrap();
        assert!(json.contains("\"stage\":\"cart\""));
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(back, session);
    }
}
