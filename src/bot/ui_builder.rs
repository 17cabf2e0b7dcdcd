//! UI Builder module: Telegram rendering of outbound payloads
//!
//! Structured menus become inline keyboards whose callback data is the option id, sent
//! together with the numbered text so typed answers keep working. Message texts carry
//! `*bold*` markup, which is turned into Telegram HTML on the way out.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ParseMode};
use teloxide::RequestError;
use tracing::warn;

use crate::error::SendError;
use crate::outbound::{MenuMessage, Messenger, OutboundPayload, SentMessageId};

/// Suffix of customer ids owned by this transport
pub const CUSTOMER_ID_SUFFIX: &str = "@telegram";

/// Longest button label before it is shortened
const MAX_BUTTON_LABEL_CHARS: usize = 40;

lazy_static! {
    static ref BOLD: Regex = Regex::new(r"\*([^*\n]+)\*").expect("bold markup regex should compile");
}

/// Escape `text` for Telegram HTML and turn `*bold*` spans into `<b>` tags
pub fn to_telegram_html(text: &str) -> String {
    let escaped = text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    BOLD.replace_all(&escaped, "<b>$1</b>").into_owned()
}

/// Remove `*bold*` markers, for the unformatted fallback
pub fn strip_markup(text: &str) -> String {
    BOLD.replace_all(text, "$1").into_owned()
}

pub fn customer_id_for(chat_id: ChatId) -> String {
    format!("{}{CUSTOMER_ID_SUFFIX}", chat_id.0)
}

pub fn chat_id_for(customer_id: &str) -> Option<ChatId> {
    customer_id
        .strip_suffix(CUSTOMER_ID_SUFFIX)?
        .parse::<i64>()
        .ok()
        .map(ChatId)
}

/// Registry key for a delivered message
pub fn sent_message_key(chat_id: ChatId, message_id: MessageId) -> SentMessageId {
    format!("{}:{}", chat_id.0, message_id.0)
}

fn button_label(label: &str) -> String {
    if label.chars().count() > MAX_BUTTON_LABEL_CHARS {
        let short: String = label.chars().take(MAX_BUTTON_LABEL_CHARS - 3).collect();
        format!("{short}...")
    } else {
        label.to_string()
    }
}

/// One button per row, in option order
pub fn menu_keyboard(menu: &MenuMessage) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = menu
        .options
        .iter()
        .map(|option| vec![InlineKeyboardButton::callback(button_label(&option.label), option.id.clone())])
        .collect();

    InlineKeyboardMarkup::new(rows)
}

fn send_error(e: RequestError) -> SendError {
    if matches!(e, RequestError::RetryAfter(_)) {
        SendError::RateLimited(e.to_string())
    } else {
        SendError::Transport(e.to_string())
    }
}

/// [`Messenger`] backed by the Telegram Bot API
#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send(
        &self,
        customer_id: &str,
        payload: &OutboundPayload,
    ) -> Result<SentMessageId, SendError> {
        let chat_id = chat_id_for(customer_id)
            .ok_or_else(|| SendError::InvalidRecipient(customer_id.to_string()))?;

        let (text, keyboard) = match payload {
            OutboundPayload::Text(text) => (text.clone(), None),
            OutboundPayload::Menu(menu) => (menu.to_numbered_text(), Some(menu_keyboard(menu))),
        };

        let mut request = self
            .bot
            .send_message(chat_id, to_telegram_html(&text))
            .parse_mode(ParseMode::Html);
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(keyboard);
        }

        let sent = match request.await {
            Ok(message) => message,
            Err(e) if matches!(e, RequestError::RetryAfter(_)) => return Err(send_error(e)),
            Err(e) => {
                warn!(customer_id, error = %e, "Formatted send failed, falling back to plain text");
                self.bot
                    .send_message(chat_id, strip_markup(&text))
                    .await
                    .map_err(send_error)?
            }
        };

        Ok(sent_message_key(chat_id, sent.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbound::MenuOption;

    #[test]
    fn test_customer_id_mapping() {
        assert_eq!(customer_id_for(ChatId(12345)), "12345@telegram");
        assert_eq!(chat_id_for("12345@telegram"), Some(ChatId(12345)));
        assert_eq!(chat_id_for("-100200@telegram"), Some(ChatId(-100200)));
        assert_eq!(chat_id_for("5527999990000@s.whatsapp.net"), None);
    }

    #[test]
    fn test_bold_markup_becomes_html() {
        assert_eq!(
            to_telegram_html("💰 *TOTAL: R$ 70.00*"),
            "💰 <b>TOTAL: R$ 70.00</b>"
        );
        assert_eq!(
            to_telegram_html("*Pedido* <PED261017123> & cia"),
            "<b>Pedido</b> &lt;PED261017123&gt; &amp; cia"
        );
        // A lone asterisk is left alone
        assert_eq!(to_telegram_html("2 * 3"), "2 * 3");
    }

    #[test]
    fn test_strip_markup_for_plain_fallback() {
        assert_eq!(strip_markup("✅ *ATENDIMENTO ENCERRADO*"), "✅ ATENDIMENTO ENCERRADO");
    }

    #[test]
    fn test_menu_keyboard_uses_option_ids() {
        let menu = MenuMessage {
            title: "Menu".to_string(),
            body: String::new(),
            options: vec![
                MenuOption::new("1", "Fazer orçamento"),
                MenuOption::new("2", "Acompanhar um pedido já realizado com a nossa equipe"),
            ],
            footer: String::new(),
        };

        let keyboard = menu_keyboard(&menu);
        assert_eq!(keyboard.inline_keyboard.len(), 2);
        assert_eq!(keyboard.inline_keyboard[0][0].text, "Fazer orçamento");
        assert!(keyboard.inline_keyboard[1][0].text.ends_with("..."));
        assert_eq!(keyboard.inline_keyboard[1][0].text.chars().count(), MAX_BUTTON_LABEL_CHARS);
    }
}
