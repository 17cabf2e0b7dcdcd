//! Callback Handler module: picks from inline keyboards
//!
//! The callback data is the id of the chosen menu option, fed to the conversation exactly
//! as if the customer had typed it.

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use tracing::{debug, warn};

use super::dialogue_manager::{DialogueManager, InboundEvent};
use super::ui_builder::customer_id_for;

/// Normalize a callback query; `None` when it carries no data
pub fn inbound_from_callback(q: &CallbackQuery) -> Option<InboundEvent> {
    let data = q.data.as_deref()?;
    let chat_id = q
        .message
        .as_ref()
        .map(|message| message.chat().id)
        .unwrap_or(ChatId(q.from.id.0 as i64));

    Some(InboundEvent::from_customer(
        customer_id_for(chat_id),
        data,
        Utc::now(),
    ))
}

pub async fn callback_handler(bot: Bot, q: CallbackQuery, manager: Arc<DialogueManager>) -> Result<()> {
    debug!(user_id = %q.from.id, "Received callback query from user");

    // Stops the loading indicator on the button
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        warn!(user_id = %q.from.id, error = %e, "Failed to answer callback query");
    }

    match inbound_from_callback(&q) {
        Some(event) => manager.handle_inbound(event).await,
        None => debug!(user_id = %q.from.id, "Callback query without data"),
    }

    Ok(())
}
