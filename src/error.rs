//! # Error Types Module
//!
//! Typed errors for the two fallible boundaries of the bot: persistence and the
//! outbound messaging transport. Everything above these boundaries works with
//! `anyhow::Result` or degrades to a re-prompt.

use thiserror::Error;

/// Errors raised by any storage backend
#[derive(Debug, Error)]
pub enum StoreError {
    /// File system errors from the JSON file backend
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be encoded or decoded
    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// PostgreSQL errors
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Order id generation kept colliding with existing ids
    #[error("could not allocate a unique order id after {0} attempts")]
    OrderIdExhausted(u32),
}

/// Errors raised by a [`Messenger`](crate::outbound::Messenger) when sending
#[derive(Debug, Clone, Error)]
pub enum SendError {
    /// The transport asked us to slow down
    #[error("transport rate limit: {0}")]
    RateLimited(String),

    /// Any other transport failure; the message is dropped
    #[error("transport error: {0}")]
    Transport(String),

    /// The customer identifier cannot be addressed by this transport
    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),
}

impl SendError {
    /// Whether the scheduler should cool down and retry instead of dropping
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, SendError::RateLimited(_))
    }
}
