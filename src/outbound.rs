//! # Outbound Messages
//!
//! What the conversation asks the transport to deliver: plain text or a structured
//! single-select menu. Every menu can be flattened to a numbered text rendering, which is
//! used both in text render mode and as the fallback when a transport cannot render menus.

use async_trait::async_trait;
use std::fmt::Write;
use std::str::FromStr;

use crate::error::SendError;

/// Identifier the transport assigned to a delivered message
pub type SentMessageId = String;

/// How menus reach the customer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderMode {
    /// Menus are sent as numbered text
    #[default]
    Text,
    /// Menus are sent as native single-select menus when the transport supports them
    StructuredMenu,
}

impl FromStr for RenderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(RenderMode::Text),
            "menu" | "structured" | "structured_menu" => Ok(RenderMode::StructuredMenu),
            other => Err(format!("unknown render mode '{other}'")),
        }
    }
}

/// Pacing profile used by the scheduler to pick a human-like delay
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SendCategory {
    Menu,
    Text,
    Complex,
    Error,
}

/// One selectable entry of a structured menu
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MenuOption {
    /// Text fed back into the conversation when the option is picked
    pub id: String,
    pub label: String,
    pub description: Option<String>,
}

impl MenuOption {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MenuMessage {
    pub title: String,
    /// Text shown between the title and the options; may be empty
    pub body: String,
    pub options: Vec<MenuOption>,
    /// Closing instruction shown after the options; may be empty
    pub footer: String,
}

impl MenuMessage {
    /// Numbered text rendering used when structured menus are unavailable
    pub fn to_numbered_text(&self) -> String {
        let mut text = String::new();

        for part in [&self.title, &self.body] {
            if !part.is_empty() {
                text.push_str(part);
                text.push_str("\n\n");
            }
        }

        for (i, option) in self.options.iter().enumerate() {
            let _ = writeln!(text, "{} {}", number_emoji(i + 1), option.label);
            if let Some(description) = &option.description {
                let _ = writeln!(text, "   ↳ {description}");
            }
        }

        if !self.footer.is_empty() {
            text.push('\n');
            text.push_str(&self.footer);
        }

        text.trim_end().to_string()
    }
}

/// Keycap emoji for small numbers, plain `n.` otherwise
pub fn number_emoji(n: usize) -> String {
    match n {
        0..=9 => format!("{n}\u{fe0f}\u{20e3}"),
        10 => "🔟".to_string(),
        _ => format!("{n}."),
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutboundPayload {
    Text(String),
    Menu(MenuMessage),
}

impl OutboundPayload {
    /// The payload as text, flattening menus
    pub fn as_text(&self) -> String {
        match self {
            OutboundPayload::Text(text) => text.clone(),
            OutboundPayload::Menu(menu) => menu.to_numbered_text(),
        }
    }
}

/// A reply produced by one conversation turn or sweep
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outbound {
    pub payload: OutboundPayload,
    pub category: SendCategory,
}

impl Outbound {
    pub fn text(text: impl Into<String>, category: SendCategory) -> Self {
        Self {
            payload: OutboundPayload::Text(text.into()),
            category,
        }
    }

    pub fn menu(menu: MenuMessage) -> Self {
        Self {
            payload: OutboundPayload::Menu(menu),
            category: SendCategory::Menu,
        }
    }

    /// Adapt the payload to the configured render mode
    pub fn rendered(self, mode: RenderMode) -> Self {
        match (mode, self.payload) {
            (RenderMode::Text, OutboundPayload::Menu(menu)) => Self {
                payload: OutboundPayload::Text(menu.to_numbered_text()),
                category: self.category,
            },
            (_, payload) => Self {
                payload,
                category: self.category,
            },
        }
    }

    /// Text content, flattening menus; convenient for assertions and logs
    pub fn text_content(&self) -> String {
        self.payload.as_text()
    }
}

/// Delivery side of the messaging transport
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Deliver one payload to a customer, returning the transport's message id
    async fn send(
        &self,
        customer_id: &str,
        payload: &OutboundPayload,
    ) -> Result<SentMessageId, SendError>;
}
