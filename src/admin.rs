//! # Admin Side Channel
//!
//! `/admin ...` commands sent by customers listed in `ADMIN_IDS`. They bypass the
//! conversation state machine entirely and reply with a single text message.

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt::Write;
use tracing::info;

use crate::catalog::Catalog;
use crate::config::BotConfig;
use crate::error::StoreError;
use crate::localization::{t, t_args};
use crate::messages;
use crate::outbound::{Outbound, SendCategory};
use crate::store::Storage;

/// Sessions listed by `/admin clientes`
pub const CLIENTS_SHOWN: usize = 10;
/// Off-hours messages listed by `/admin recados`
pub const NOTES_SHOWN: usize = 10;

lazy_static! {
    // Telegram may append the bot username to commands: /admin@shop_bot status
    static ref ADMIN_COMMAND: Regex = Regex::new(r"(?is)^/admin(?:@\w+)?(?:\s+(.*))?$")
        .expect("admin command regex should compile");
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WhitelistAction {
    Add(String),
    Remove(String),
    List,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    Status,
    Clients,
    Catalog,
    Whitelist(WhitelistAction),
    /// Hand the customer back to the bot
    Release(String),
    /// Silence the bot for a customer a human is now serving
    TakeOver(String),
    Notes,
    Help,
}

impl AdminCommand {
    /// Customer whose session the command rewrites
    pub fn target_customer(&self) -> Option<&str> {
        match self {
            AdminCommand::Release(id) | AdminCommand::TakeOver(id) => Some(id.as_str()),
            _ => None,
        }
    }
}

/// Parse an admin command; `None` when `text` is not addressed to the admin channel
pub fn parse_admin_command(text: &str) -> Option<AdminCommand> {
    let captures = ADMIN_COMMAND.captures(text.trim())?;
    let args: Vec<&str> = captures
        .get(1)
        .map(|m| m.as_str().split_whitespace().collect())
        .unwrap_or_default();

    let command = match args.as_slice() {
        [cmd] if cmd.eq_ignore_ascii_case("status") => AdminCommand::Status,
        [cmd] if cmd.eq_ignore_ascii_case("clientes") => AdminCommand::Clients,
        [cmd] if cmd.eq_ignore_ascii_case("catalogo") => AdminCommand::Catalog,
        [cmd] if cmd.eq_ignore_ascii_case("recados") => AdminCommand::Notes,
        [cmd, action] if cmd.eq_ignore_ascii_case("whitelist") && action.eq_ignore_ascii_case("list") => {
            AdminCommand::Whitelist(WhitelistAction::List)
        }
        [cmd, action, id] if cmd.eq_ignore_ascii_case("whitelist") => {
            if action.eq_ignore_ascii_case("add") {
                AdminCommand::Whitelist(WhitelistAction::Add(id.to_string()))
            } else if action.eq_ignore_ascii_case("remove") {
                AdminCommand::Whitelist(WhitelistAction::Remove(id.to_string()))
            } else {
                AdminCommand::Help
            }
        }
        [cmd, id] if cmd.eq_ignore_ascii_case("liberar") => AdminCommand::Release(id.to_string()),
        [cmd, id] if cmd.eq_ignore_ascii_case("assumir") => AdminCommand::TakeOver(id.to_string()),
        _ => AdminCommand::Help,
    };

    Some(command)
}

fn format_uptime(started_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - started_at).num_minutes().max(0);
    format!("{}h {}m", minutes / 60, minutes % 60)
}

pub struct Admin<'a> {
    config: &'a BotConfig,
    catalog: &'a Catalog,
    storage: &'a Storage,
    started_at: DateTime<Utc>,
}

impl<'a> Admin<'a> {
    pub fn new(
        config: &'a BotConfig,
        catalog: &'a Catalog,
        storage: &'a Storage,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            config,
            catalog,
            storage,
            started_at,
        }
    }

    pub async fn execute(
        &self,
        admin_id: &str,
        command: &AdminCommand,
        now: DateTime<Utc>,
    ) -> Result<Outbound, StoreError> {
        info!(admin_id, command = ?command, "Admin command");

        let text = match command {
            AdminCommand::Status => self.status(now).await?,
            AdminCommand::Clients => self.clients().await?,
            AdminCommand::Catalog => format!(
                "{}\n\n{}",
                t("admin-catalog-title"),
                messages::plain_catalog(self.catalog)
            ),
            AdminCommand::Whitelist(action) => self.whitelist(action).await?,
            AdminCommand::Release(customer_id) => self.release(customer_id).await?,
            AdminCommand::TakeOver(customer_id) => self.take_over(customer_id, now).await?,
            AdminCommand::Notes => self.notes().await?,
            AdminCommand::Help => t("admin-usage"),
        };

        Ok(Outbound::text(text, SendCategory::Complex))
    }

    async fn status(&self, now: DateTime<Utc>) -> Result<String, StoreError> {
        let local_now = now.with_timezone(&self.config.utc_offset);
        let hours_status = if self.config.schedule.is_open_at(&local_now) {
            t("admin-open")
        } else {
            t("admin-closed")
        };

        let sessions = self.storage.sessions.list_all().await?.len().to_string();
        let orders = self.storage.orders.count().await?.to_string();
        let off_hours = self.storage.off_hours.count().await?.to_string();
        let clock = local_now.format("%d/%m/%Y %H:%M").to_string();
        let uptime = format_uptime(self.started_at, now);

        Ok(t_args(
            "admin-status",
            &[
                ("hours_status", hours_status.as_str()),
                ("sessions", sessions.as_str()),
                ("now", clock.as_str()),
                ("orders", orders.as_str()),
                ("off_hours", off_hours.as_str()),
                ("uptime", uptime.as_str()),
            ],
        ))
    }

    async fn clients(&self) -> Result<String, StoreError> {
        let mut sessions = self.storage.sessions.list_all().await?;
        if sessions.is_empty() {
            return Ok(t("admin-no-clients"));
        }

        sessions.sort_by(|a, b| b.last_interaction_at.cmp(&a.last_interaction_at));

        let mut text = t("admin-clients-title");
        for session in sessions.iter().take(CLIENTS_SHOWN) {
            let stage = format!("{:?}", session.stage);
            let items = session.cart.len().to_string();
            text.push_str("\n\n");
            text.push_str(&t_args(
                "admin-client-line",
                &[
                    ("customer", session.customer_id.as_str()),
                    ("stage", stage.as_str()),
                    ("items", items.as_str()),
                ],
            ));
        }
        Ok(text)
    }

    async fn whitelist(&self, action: &WhitelistAction) -> Result<String, StoreError> {
        let whitelist = &self.storage.whitelist;

        match action {
            WhitelistAction::Add(id) => {
                let key = if whitelist.add(id).await? {
                    "admin-whitelist-added"
                } else {
                    "admin-whitelist-exists"
                };
                Ok(t_args(key, &[("customer", id.as_str())]))
            }
            WhitelistAction::Remove(id) => {
                let key = if whitelist.remove(id).await? {
                    "admin-whitelist-removed"
                } else {
                    "admin-whitelist-missing"
                };
                Ok(t_args(key, &[("customer", id.as_str())]))
            }
            WhitelistAction::List => {
                let ids = whitelist.list().await?;
                if ids.is_empty() {
                    return Ok(t("admin-whitelist-empty"));
                }
                let mut text = t("admin-whitelist-title");
                for id in ids {
                    let _ = write!(text, "\n• {id}");
                }
                Ok(text)
            }
        }
    }

    async fn release(&self, customer_id: &str) -> Result<String, StoreError> {
        let Some(mut session) = self.storage.sessions.get(customer_id).await? else {
            return Ok(t_args("admin-session-missing", &[("customer", customer_id)]));
        };

        session.human_override_active = false;
        session.reset_nudges();
        self.storage.sessions.put(&session).await?;
        Ok(t_args("admin-released", &[("customer", customer_id)]))
    }

    async fn take_over(&self, customer_id: &str, now: DateTime<Utc>) -> Result<String, StoreError> {
        let mut session = self.storage.sessions.get_or_create(customer_id, now).await?;
        session.human_override_active = true;
        self.storage.sessions.put(&session).await?;
        Ok(t_args("admin-taken-over", &[("customer", customer_id)]))
    }

    async fn notes(&self) -> Result<String, StoreError> {
        let notes = self.storage.off_hours.recent(NOTES_SHOWN).await?;
        if notes.is_empty() {
            return Ok(t("admin-no-notes"));
        }

        let mut text = t("admin-notes-title");
        for note in notes {
            let when = note
                .received_at
                .with_timezone(&self.config.utc_offset)
                .format("%d/%m %H:%M")
                .to_string();
            text.push('\n');
            text.push_str(&t_args(
                "admin-note-line",
                &[
                    ("customer", note.customer_id.as_str()),
                    ("when", when.as_str()),
                    ("text", note.text.as_str()),
                ],
            ));
        }
        Ok(text)
    }
}
