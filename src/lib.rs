//! # Order Intake Bot
//!
//! A conversational order-intake bot for a small personalized-products shop: customers
//! browse the catalog, build a cart and place quote requests, track orders, or ask for a
//! human attendant, all through a chat channel. Outside business hours it switches to a
//! restricted menu and logs messages for follow-up.

pub mod admin;
pub mod bot;
pub mod business_hours;
pub mod catalog;
pub mod config;
pub mod conversation;
pub mod dialogue;
pub mod error;
pub mod localization;
pub mod messages;
pub mod nudge;
pub mod order;
pub mod outbound;
pub mod rate_limiter;
pub mod reaper;
pub mod scheduler;
pub mod session;
pub mod store;
