//! # Conversation State Machine
//!
//! [`Conversation::step`] consumes one inbound text for one session and produces the
//! replies for that turn. Apart from order placement and the off-hours log, it only
//! mutates the session it is given; persisting that session is the caller's job.
//!
//! Precedence, first match wins:
//!
//! 1. human override active: silence
//! 2. whitelisted customer: silence
//! 3. global commands (`MENU`, `ATENDENTE`/`AJUDA`, `CARRINHO`, `VOLTAR`, `ENCERRAR`/`FINALIZAR`)
//! 4. closed and in the initial stage: log the message and open the off-hours menu
//! 5. closed and in an off-hours stage: off-hours sub-menu
//! 6. per-stage handling
//!
//! Invalid input never fails a turn; it re-prompts without changing stage. Only storage
//! failures surface as errors.

use chrono::{DateTime, Timelike, Utc};
use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::config::BotConfig;
use crate::dialogue::{validate_quantity, Confirmation, GlobalCommand, InboundText, Stage};
use crate::error::StoreError;
use crate::messages;
use crate::outbound::Outbound;
use crate::session::{CartLine, Session};
use crate::store::{append_order, OffHoursLog, OffHoursMessage, OrderLedger};

/// How many past orders are listed when the customer opens order tracking
pub const RECENT_ORDERS_SHOWN: usize = 3;

/// Facts about the turn that do not come from the session or the text
#[derive(Debug, Clone, Copy)]
pub struct TurnContext {
    pub now: DateTime<Utc>,
    /// Result of the business-hours oracle for `now`
    pub is_open: bool,
    /// Customer is on the whitelist (and is not an admin)
    pub whitelisted: bool,
}

/// First characters of a customer text, for logs
pub fn preview(text: &str) -> String {
    text.chars().take(50).collect()
}

pub struct Conversation<'a> {
    config: &'a BotConfig,
    catalog: &'a Catalog,
    orders: &'a dyn OrderLedger,
    off_hours: &'a dyn OffHoursLog,
}

impl<'a> Conversation<'a> {
    pub fn new(
        config: &'a BotConfig,
        catalog: &'a Catalog,
        orders: &'a dyn OrderLedger,
        off_hours: &'a dyn OffHoursLog,
    ) -> Self {
        Self {
            config,
            catalog,
            orders,
            off_hours,
        }
    }

    /// Process one inbound text, returning the replies rendered for the configured mode
    pub async fn step(
        &self,
        session: &mut Session,
        input: &InboundText,
        ctx: &TurnContext,
    ) -> Result<Vec<Outbound>, StoreError> {
        let stage_before = session.stage;
        session.last_interaction_at = ctx.now;

        let replies = self.dispatch(session, input, ctx).await?;

        debug!(
            customer_id = %session.customer_id,
            stage_before = ?stage_before,
            stage_after = ?session.stage,
            replies = replies.len(),
            "Conversation step completed"
        );

        Ok(replies
            .into_iter()
            .map(|reply| reply.rendered(self.config.render_mode))
            .collect())
    }

    async fn dispatch(
        &self,
        session: &mut Session,
        input: &InboundText,
        ctx: &TurnContext,
    ) -> Result<Vec<Outbound>, StoreError> {
        if session.human_override_active {
            debug!(customer_id = %session.customer_id, "Human operator in charge, staying silent");
            return Ok(Vec::new());
        }

        if ctx.whitelisted {
            debug!(customer_id = %session.customer_id, "Whitelisted customer, staying silent");
            return Ok(Vec::new());
        }

        // Leftover off-hours stage from an earlier closed period
        if ctx.is_open && session.stage.is_off_hours() {
            session.stage = Stage::Initial;
        }

        if input.is_empty() {
            return Ok(self.blank_input(session, ctx));
        }

        if let Some(command) = input.global_command() {
            return Ok(self.global_command(session, command));
        }

        if !ctx.is_open && session.stage == Stage::Initial {
            self.log_off_hours(session, input, ctx).await?;
            session.stage = Stage::OffHoursMenu;
            return Ok(vec![
                messages::off_hours_notice(&self.config.schedule),
                messages::off_hours_menu(),
            ]);
        }

        if !ctx.is_open && session.stage.is_off_hours() {
            return self.off_hours_stage(session, input, ctx).await;
        }

        match session.stage {
            Stage::Initial => Ok(self.initial(session, ctx)),
            Stage::Menu => self.menu(session, input).await,
            Stage::ProductBrowse => Ok(self.product_browse(session, input)),
            Stage::ProductQuantity => Ok(self.product_quantity(session, input)),
            Stage::Cart => Ok(self.cart(session, input)),
            Stage::CartEdit => Ok(self.cart_edit(session, input)),
            Stage::CartConfirm => self.cart_confirm(session, input, ctx).await,
            Stage::OrderTracking => self.order_tracking(session, input).await,
            Stage::HumanHandoff => Ok(self.human_handoff(session, input)),
            Stage::AwaitingAgent => {
                info!(
                    customer_id = %session.customer_id,
                    text = %preview(input.raw()),
                    "Customer waiting for an agent sent another message"
                );
                Ok(Vec::new())
            }
            // Unreachable while open; handled above while closed
            Stage::OffHoursMenu | Stage::OffHoursCatalog => Ok(self.initial(session, ctx)),
        }
    }

    /// Re-prompt for a blank message without logging or forwarding it
    fn blank_input(&self, session: &mut Session, ctx: &TurnContext) -> Vec<Outbound> {
        let shop = &self.config.shop;
        let schedule = &self.config.schedule;

        match session.stage {
            Stage::Initial if ctx.is_open => self.initial(session, ctx),
            Stage::Initial => {
                session.stage = Stage::OffHoursMenu;
                vec![messages::off_hours_notice(schedule), messages::off_hours_menu()]
            }
            Stage::Menu if session.nudge_exhausted => Vec::new(),
            Stage::Menu => vec![messages::menu_invalid()],
            Stage::ProductBrowse => vec![messages::product_invalid()],
            Stage::ProductQuantity => vec![messages::quantity_invalid()],
            Stage::Cart => vec![messages::cart_invalid_option()],
            Stage::CartEdit => vec![messages::cart_item_invalid()],
            Stage::CartConfirm => vec![messages::confirm_invalid()],
            Stage::OrderTracking => vec![messages::tracking_new_prompt()],
            Stage::HumanHandoff => vec![messages::handoff(shop)],
            // Every message here waits for the agent
            Stage::AwaitingAgent => Vec::new(),
            Stage::OffHoursMenu => vec![messages::off_hours_menu()],
            Stage::OffHoursCatalog => vec![messages::off_hours_restricted(shop, schedule)],
        }
    }

    fn enter_menu(&self, session: &mut Session) {
        session.stage = Stage::Menu;
        session.selected_product = None;
        session.reset_nudges();
    }

    fn global_command(&self, session: &mut Session, command: GlobalCommand) -> Vec<Outbound> {
        let shop = &self.config.shop;

        match command {
            GlobalCommand::Menu => {
                self.enter_menu(session);
                vec![messages::main_menu(shop)]
            }
            GlobalCommand::Attendant => {
                session.stage = Stage::HumanHandoff;
                session.selected_product = None;
                vec![messages::handoff(shop)]
            }
            GlobalCommand::Cart if session.cart.is_empty() => vec![messages::cart_empty()],
            GlobalCommand::Cart => {
                session.stage = Stage::Cart;
                session.selected_product = None;
                vec![messages::cart_menu(&session.cart, None)]
            }
            GlobalCommand::Back => match session.stage.back_target() {
                Stage::OffHoursMenu => {
                    session.stage = Stage::OffHoursMenu;
                    vec![messages::off_hours_menu()]
                }
                _ => {
                    self.enter_menu(session);
                    vec![messages::main_menu(shop)]
                }
            },
            GlobalCommand::End => {
                session.stage = Stage::Initial;
                session.selected_product = None;
                vec![messages::closing()]
            }
        }
    }

    fn initial(&self, session: &mut Session, ctx: &TurnContext) -> Vec<Outbound> {
        let local_hour = ctx.now.with_timezone(&self.config.utc_offset).hour();
        self.enter_menu(session);
        vec![
            messages::welcome(&self.config.shop, &self.config.schedule, local_hour),
            messages::main_menu(&self.config.shop),
        ]
    }

    async fn menu(
        &self,
        session: &mut Session,
        input: &InboundText,
    ) -> Result<Vec<Outbound>, StoreError> {
        let shop = &self.config.shop;

        match input.option() {
            Some(1) => {
                session.stage = Stage::ProductBrowse;
                Ok(vec![messages::quote_catalog(self.catalog, shop)])
            }
            Some(2) => {
                let recent = self
                    .orders
                    .find_by_customer(&session.customer_id, RECENT_ORDERS_SHOWN)
                    .await?;
                session.stage = Stage::OrderTracking;
                Ok(vec![messages::tracking_prompt(
                    &recent,
                    shop,
                    &self.config.utc_offset,
                )])
            }
            Some(3) => {
                session.stage = Stage::HumanHandoff;
                Ok(vec![messages::handoff(shop)])
            }
            _ if session.nudge_exhausted => {
                debug!(customer_id = %session.customer_id, "Ignoring invalid menu input after nudges ran out");
                Ok(Vec::new())
            }
            _ => Ok(vec![messages::menu_invalid()]),
        }
    }

    fn product_browse(&self, session: &mut Session, input: &InboundText) -> Vec<Outbound> {
        if input.is_keyword("CATEGORIAS") || input.is_keyword("CATEGORIES") {
            return vec![messages::grouped_catalog(self.catalog)];
        }

        match input.option().and_then(|n| self.catalog.lookup_by_index(n)) {
            Some(name) => {
                session.selected_product = Some(name.to_string());
                session.stage = Stage::ProductQuantity;
                vec![messages::quantity_prompt(self.catalog, name)]
            }
            None => vec![messages::product_invalid()],
        }
    }

    fn product_quantity(&self, session: &mut Session, input: &InboundText) -> Vec<Outbound> {
        let selected = session.selected_product.clone();
        let Some(name) = selected else {
            session.stage = Stage::ProductBrowse;
            return vec![messages::grouped_catalog(self.catalog)];
        };

        let quantity = match validate_quantity(input.raw()) {
            Ok(quantity) => quantity,
            Err(_) => return vec![messages::quantity_invalid()],
        };

        let Some(price) = self.catalog.price_of(&name) else {
            // Catalog changed under the customer
            session.selected_product = None;
            session.stage = Stage::ProductBrowse;
            return vec![messages::product_invalid()];
        };

        session.cart.push(CartLine::new(name, price, quantity));
        session.selected_product = None;
        session.stage = Stage::Cart;
        vec![messages::product_added(&session.cart)]
    }

    fn cart(&self, session: &mut Session, input: &InboundText) -> Vec<Outbound> {
        match input.option() {
            Some(1) => {
                session.stage = Stage::ProductBrowse;
                vec![messages::grouped_catalog(self.catalog)]
            }
            Some(2) if session.cart.is_empty() => vec![messages::cart_nothing_to_remove()],
            Some(2) => {
                session.stage = Stage::CartEdit;
                vec![messages::cart_edit_prompt(&session.cart)]
            }
            Some(3) if session.cart.is_empty() => vec![messages::cart_cannot_finalize()],
            Some(3) => {
                session.stage = Stage::CartConfirm;
                vec![messages::confirm_prompt(&session.cart, &self.config.shop)]
            }
            Some(4) => {
                session.cart.clear();
                self.enter_menu(session);
                vec![messages::cart_emptied(&self.config.shop)]
            }
            Some(5) => {
                self.enter_menu(session);
                vec![messages::main_menu(&self.config.shop)]
            }
            _ => vec![messages::cart_invalid_option()],
        }
    }

    fn cart_edit(&self, session: &mut Session, input: &InboundText) -> Vec<Outbound> {
        match input.option().filter(|n| *n <= session.cart.len()) {
            Some(n) => {
                let removed = session.cart.remove(n - 1);
                session.stage = Stage::Cart;
                vec![messages::item_removed(&removed.product_name, &session.cart)]
            }
            None => vec![messages::cart_item_invalid()],
        }
    }

    async fn cart_confirm(
        &self,
        session: &mut Session,
        input: &InboundText,
        ctx: &TurnContext,
    ) -> Result<Vec<Outbound>, StoreError> {
        match input.confirmation() {
            Some(Confirmation::Yes) if session.cart.is_empty() => {
                session.stage = Stage::Cart;
                Ok(vec![messages::cart_cannot_finalize()])
            }
            Some(Confirmation::Yes) => {
                let local_date = ctx.now.with_timezone(&self.config.utc_offset).date_naive();
                let order = append_order(
                    self.orders,
                    &session.customer_id,
                    session.cart.clone(),
                    &self.config.shop.attendants.quote,
                    ctx.now,
                    local_date,
                )
                .await?;

                info!(
                    customer_id = %session.customer_id,
                    order_id = %order.id,
                    items = order.lines.len(),
                    total = %order.total,
                    "Order placed"
                );

                session.cart.clear();
                self.enter_menu(session);
                Ok(vec![messages::order_confirmed(&order, &self.config.shop)])
            }
            Some(Confirmation::No) => {
                session.stage = Stage::Cart;
                Ok(vec![messages::cart_adjust(&session.cart)])
            }
            None => Ok(vec![messages::confirm_invalid()]),
        }
    }

    async fn order_tracking(
        &self,
        session: &mut Session,
        input: &InboundText,
    ) -> Result<Vec<Outbound>, StoreError> {
        if input.is_keyword("NOVO") {
            return Ok(vec![messages::tracking_new_prompt()]);
        }

        match self.orders.find_by_id(input.raw()).await? {
            Some(order) => Ok(vec![messages::order_details(
                &order,
                &self.config.shop,
                &self.config.utc_offset,
            )]),
            None => {
                info!(
                    customer_id = %session.customer_id,
                    query = %preview(input.raw()),
                    "Order not found, customer needs human attention"
                );
                Ok(vec![messages::order_not_found(input.raw(), &self.config.shop)])
            }
        }
    }

    fn human_handoff(&self, session: &mut Session, input: &InboundText) -> Vec<Outbound> {
        info!(
            customer_id = %session.customer_id,
            text = %preview(input.raw()),
            "Customer needs human attention"
        );
        session.stage = Stage::AwaitingAgent;
        vec![messages::handoff_forwarded(input.raw(), &self.config.shop)]
    }

    async fn off_hours_stage(
        &self,
        session: &mut Session,
        input: &InboundText,
        ctx: &TurnContext,
    ) -> Result<Vec<Outbound>, StoreError> {
        let shop = &self.config.shop;
        let schedule = &self.config.schedule;

        if session.stage == Stage::OffHoursMenu {
            match input.option() {
                Some(1) => {
                    session.stage = Stage::OffHoursCatalog;
                    return Ok(vec![messages::off_hours_catalog(self.catalog)]);
                }
                Some(2) => return Ok(vec![messages::off_hours_instagram(shop)]),
                Some(3) => return Ok(vec![messages::off_hours_contact(shop, schedule)]),
                _ => {}
            }
            self.log_off_hours(session, input, ctx).await?;
            return Ok(vec![messages::off_hours_menu()]);
        }

        self.log_off_hours(session, input, ctx).await?;
        Ok(vec![messages::off_hours_restricted(shop, schedule)])
    }

    async fn log_off_hours(
        &self,
        session: &Session,
        input: &InboundText,
        ctx: &TurnContext,
    ) -> Result<(), StoreError> {
        let message = OffHoursMessage {
            customer_id: session.customer_id.clone(),
            text: input.raw().to_string(),
            received_at: ctx.now,
        };
        self.off_hours.append(&message).await?;
        info!(customer_id = %session.customer_id, "Off-hours message saved");
        Ok(())
    }
}
