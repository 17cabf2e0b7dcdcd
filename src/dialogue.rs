//! Conversation stages and input classification for the order dialogue.

use serde::{Deserialize, Serialize};

/// Smallest quantity accepted for a cart line
pub const MIN_QUANTITY: u32 = 1;
/// Largest quantity accepted for a cart line
pub const MAX_QUANTITY: u32 = 100;

/// Represents the position of a customer inside the order dialogue
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Initial,
    Menu,
    OffHoursMenu,
    OffHoursCatalog,
    ProductBrowse,
    ProductQuantity,
    Cart,
    CartEdit,
    CartConfirm,
    OrderTracking,
    HumanHandoff,
    /// Automated replies suppressed until the customer navigates away
    AwaitingAgent,
}

impl Stage {
    pub const ALL: [Stage; 12] = [
        Stage::Initial,
        Stage::Menu,
        Stage::OffHoursMenu,
        Stage::OffHoursCatalog,
        Stage::ProductBrowse,
        Stage::ProductQuantity,
        Stage::Cart,
        Stage::CartEdit,
        Stage::CartConfirm,
        Stage::OrderTracking,
        Stage::HumanHandoff,
        Stage::AwaitingAgent,
    ];

    /// Target of the `VOLTAR` command
    pub fn back_target(self) -> Stage {
        match self {
            Stage::ProductBrowse
            | Stage::ProductQuantity
            | Stage::Cart
            | Stage::CartEdit
            | Stage::CartConfirm => Stage::Menu,
            Stage::OrderTracking | Stage::HumanHandoff => Stage::Menu,
            Stage::OffHoursMenu | Stage::OffHoursCatalog => Stage::OffHoursMenu,
            _ => Stage::Menu,
        }
    }

    pub fn is_off_hours(self) -> bool {
        matches!(self, Stage::OffHoursMenu | Stage::OffHoursCatalog)
    }
}

/// Commands recognized at any stage
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GlobalCommand {
    Menu,
    Attendant,
    Cart,
    Back,
    End,
}

/// Answer to a yes/no prompt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Confirmation {
    Yes,
    No,
}

/// Why a quantity was rejected
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuantityError {
    NotANumber,
    OutOfRange,
}

/// The text payload of one inbound turn, typed or picked from a structured menu
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundText {
    raw: String,
    normalized: String,
}

impl InboundText {
    pub fn new(text: impl AsRef<str>) -> Self {
        let raw = text.as_ref().trim().to_string();
        let normalized = raw.to_uppercase();
        Self { raw, normalized }
    }

    /// Trimmed text as the customer sent it
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Trimmed, upper-cased text used for keyword matching
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn global_command(&self) -> Option<GlobalCommand> {
        match self.normalized.as_str() {
            "MENU" => Some(GlobalCommand::Menu),
            "ATENDENTE" | "AJUDA" => Some(GlobalCommand::Attendant),
            "CARRINHO" => Some(GlobalCommand::Cart),
            "VOLTAR" => Some(GlobalCommand::Back),
            "ENCERRAR" | "FINALIZAR" => Some(GlobalCommand::End),
            _ => None,
        }
    }

    /// Positive integer option, e.g. a menu number or 1-based list index
    pub fn option(&self) -> Option<usize> {
        self.raw.parse::<usize>().ok().filter(|n| *n > 0)
    }

    pub fn confirmation(&self) -> Option<Confirmation> {
        match self.normalized.as_str() {
            "SIM" | "S" => Some(Confirmation::Yes),
            "NÃO" | "NAO" | "N" => Some(Confirmation::No),
            _ => None,
        }
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.normalized == keyword
    }
}

/// Validates a quantity typed during the product quantity prompt
pub fn validate_quantity(input: &str) -> Result<u32, QuantityError> {
    let quantity: u32 = input
        .trim()
        .parse()
        .map_err(|_| QuantityError::NotANumber)?;

    if !(MIN_QUANTITY..=MAX_QUANTITY).contains(&quantity) {
        return Err(QuantityError::OutOfRange);
    }

    Ok(quantity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_validation() {
        assert_eq!(validate_quantity("2"), Ok(2));
        assert_eq!(validate_quantity(" 100 "), Ok(100));
        assert_eq!(validate_quantity("0"), Err(QuantityError::OutOfRange));
        assert_eq!(validate_quantity("101"), Err(QuantityError::OutOfRange));
        assert_eq!(validate_quantity("-3"), Err(QuantityError::NotANumber));
        assert_eq!(validate_quantity("duas"), Err(QuantityError::NotANumber));
    }

    #[test]
    fn test_back_targets() {
        assert_eq!(Stage::ProductQuantity.back_target(), Stage::Menu);
        assert_eq!(Stage::CartConfirm.back_target(), Stage::Menu);
        assert_eq!(Stage::HumanHandoff.back_target(), Stage::Menu);
        assert_eq!(Stage::OffHoursCatalog.back_target(), Stage::OffHoursMenu);
        assert_eq!(Stage::OffHoursMenu.back_target(), Stage::OffHoursMenu);
        assert_eq!(Stage::Initial.back_target(), Stage::Menu);
        assert_eq!(Stage::AwaitingAgent.back_target(), Stage::Menu);
    }

    #[test]
    fn test_global_commands_are_case_insensitive() {
        assert_eq!(InboundText::new(" menu ").global_command(), Some(GlobalCommand::Menu));
        assert_eq!(InboundText::new("Ajuda").global_command(), Some(GlobalCommand::Attendant));
        assert_eq!(InboundText::new("finalizar").global_command(), Some(GlobalCommand::End));
        assert_eq!(InboundText::new("1").global_command(), None);
    }

    #[test]
    fn test_confirmation_accepts_accented_no() {
        assert_eq!(InboundText::new("sim").confirmation(), Some(Confirmation::Yes));
        assert_eq!(InboundText::new("não").confirmation(), Some(Confirmation::No));
        assert_eq!(InboundText::new("nao").confirmation(), Some(Confirmation::No));
        assert_eq!(InboundText::new("talvez").confirmation(), None);
    }

    #[test]
    fn test_option_parsing() {
        assert_eq!(InboundText::new("3").option(), Some(3));
        assert_eq!(InboundText::new("0").option(), None);
        assert_eq!(InboundText::new("1a").option(), None);
    }
}
