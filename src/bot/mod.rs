//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules:
//! - `message_handler`: turns incoming text messages into inbound events
//! - `callback_handler`: turns inline keyboard picks into inbound events
//! - `ui_builder`: keyboards and the Telegram [`Messenger`](crate::outbound::Messenger)
//! - `dialogue_manager`: runs one turn from inbound event to queued replies

pub mod callback_handler;
pub mod dialogue_manager;
pub mod message_handler;
pub mod ui_builder;

// Re-export main handler functions for use in main.rs
pub use callback_handler::callback_handler;
pub use message_handler::message_handler;

pub use dialogue_manager::{DialogueManager, InboundEvent};
pub use ui_builder::TelegramMessenger;
