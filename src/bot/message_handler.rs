//! Message Handler module for incoming Telegram messages

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::debug;

use super::dialogue_manager::{DialogueManager, InboundEvent};
use super::ui_builder::customer_id_for;

/// Normalize a Telegram message into an [`InboundEvent`]; `None` for anything without text
pub fn inbound_from_message(msg: &Message) -> Option<InboundEvent> {
    let text = msg.text()?;
    Some(InboundEvent::from_customer(
        customer_id_for(msg.chat.id),
        text,
        msg.date,
    ))
}

pub async fn message_handler(_bot: Bot, msg: Message, manager: Arc<DialogueManager>) -> Result<()> {
    if !msg.chat.is_private() {
        debug!(chat_id = msg.chat.id.0, "Ignoring message from non-private chat");
        return Ok(());
    }

    match inbound_from_message(&msg) {
        Some(event) => manager.handle_inbound(event).await,
        None => debug!(chat_id = msg.chat.id.0, "Ignoring message without text"),
    }

    Ok(())
}
