//! # Messages Module
//!
//! Builders for every customer-facing reply. Texts come from the localization bundle;
//! layout that depends on data (catalog listing, cart summary, order items) is assembled here.

use chrono::FixedOffset;
use std::fmt::Write;

use crate::business_hours::WeeklySchedule;
use crate::catalog::Catalog;
use crate::config::ShopProfile;
use crate::dialogue::{MAX_QUANTITY, MIN_QUANTITY};
use crate::localization::{t, t_args};
use crate::order::Order;
use crate::outbound::{number_emoji, MenuMessage, MenuOption, Outbound, SendCategory};
use crate::session::{cart_total, CartLine};

const RULE: &str = "══════════════════════════";

/// Time-of-day greeting for a local hour (0-23)
pub fn greeting(local_hour: u32) -> String {
    match local_hour {
        0..=11 => t("greeting-morning"),
        12..=17 => t("greeting-afternoon"),
        _ => t("greeting-evening"),
    }
}

/// One line per weekday, Sunday first
pub fn schedule_text(schedule: &WeeklySchedule) -> String {
    schedule
        .entries()
        .map(|(day, hours)| {
            let hours = match hours {
                Some(hours) => hours.to_string(),
                None => t("schedule-closed"),
            };
            format!("{}: {}", t(&format!("weekday-{day}")), hours)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn welcome(shop: &ShopProfile, schedule: &WeeklySchedule, local_hour: u32) -> Outbound {
    let text = t_args(
        "welcome",
        &[
            ("greeting", greeting(local_hour).as_str()),
            ("shop", shop.name.as_str()),
            ("instagram", shop.instagram_handle.as_str()),
            ("catalog_url", shop.catalog_url.as_str()),
            ("hours", schedule_text(schedule).as_str()),
        ],
    );
    Outbound::text(text, SendCategory::Complex)
}

fn main_menu_message(shop: &ShopProfile, notice: Option<String>) -> MenuMessage {
    let title = t_args("main-menu-title", &[("shop", shop.name.as_str())]);
    let title = match notice {
        Some(notice) => format!("{notice}\n\n{title}"),
        None => title,
    };

    MenuMessage {
        title,
        body: t("main-menu-body"),
        options: vec![
            MenuOption::new("1", t("menu-option-quote")).with_description(t("menu-option-quote-desc")),
            MenuOption::new("2", t("menu-option-tracking"))
                .with_description(t("menu-option-tracking-desc")),
            MenuOption::new("3", t("menu-option-attendant"))
                .with_description(t("menu-option-attendant-desc")),
        ],
        footer: t("main-menu-footer"),
    }
}

/// The canonical main menu
pub fn main_menu(shop: &ShopProfile) -> Outbound {
    Outbound::menu(main_menu_message(shop, None))
}

pub fn cart_emptied(shop: &ShopProfile) -> Outbound {
    Outbound::menu(main_menu_message(shop, Some(t("cart-emptied"))))
}

pub fn menu_invalid() -> Outbound {
    Outbound::text(t("menu-invalid"), SendCategory::Error)
}

pub fn generic_error(shop: &ShopProfile) -> Outbound {
    Outbound::text(
        t_args("generic-error", &[("whatsapp", shop.attendants.whatsapp.as_str())]),
        SendCategory::Error,
    )
}

pub fn closing() -> Outbound {
    Outbound::text(t("closing"), SendCategory::Text)
}

pub fn nudge() -> Outbound {
    Outbound::text(t("nudge"), SendCategory::Text)
}

/// Catalog grouped by category, numbered exactly as [`Catalog::lookup_by_index`] expects
pub fn render_grouped_catalog(catalog: &Catalog) -> String {
    let mut text = t("catalog-title");
    text.push_str("\n\n");

    if catalog.is_empty() {
        text.push_str(&t("catalog-empty"));
        return text;
    }

    let mut number = 0;
    for category in catalog.categories.iter().filter(|c| !c.products.is_empty()) {
        let _ = writeln!(text, "*{}*", category.name);
        for product in &category.products {
            number += 1;
            let _ = writeln!(
                text,
                "{} {} - R$ {}",
                number_emoji(number),
                product.name,
                product.price
            );
        }
        text.push('\n');
    }

    text.push_str(&t("catalog-footer"));
    text
}

/// Plain catalog dump without emojis or instructions
pub fn plain_catalog(catalog: &Catalog) -> String {
    let mut text = String::new();
    for (i, product) in catalog.products().enumerate() {
        let _ = writeln!(text, "{}. {} - R$ {}", i + 1, product.name, product.price);
    }
    text.trim_end().to_string()
}

/// Catalog shown when the customer starts a quote
pub fn quote_catalog(catalog: &Catalog, shop: &ShopProfile) -> Outbound {
    let text = format!(
        "{}\n\n{}",
        render_grouped_catalog(catalog),
        t_args("catalog-attendant", &[("attendant", shop.attendants.quote.as_str())])
    );
    Outbound::text(text, SendCategory::Complex)
}

pub fn grouped_catalog(catalog: &Catalog) -> Outbound {
    Outbound::text(render_grouped_catalog(catalog), SendCategory::Complex)
}

pub fn product_invalid() -> Outbound {
    Outbound::text(t("product-invalid"), SendCategory::Error)
}

/// Name, price and detail lines of one product
pub fn product_details(catalog: &Catalog, name: &str) -> String {
    let mut text = format!("📦 *{name}*");
    if let Some(price) = catalog.price_of(name) {
        let _ = write!(text, "\n{}", t_args("product-price", &[("price", price.to_string().as_str())]));
    }
    for detail in catalog.details_of(name) {
        let _ = write!(text, "\n• {}: {}", detail.label, detail.value);
    }
    text
}

pub fn quantity_prompt(catalog: &Catalog, name: &str) -> Outbound {
    let text = format!(
        "{}\n\n{}",
        product_details(catalog, name),
        t("product-quantity-prompt")
    );
    Outbound::text(text, SendCategory::Text)
}

pub fn quantity_invalid() -> Outbound {
    Outbound::text(
        t_args(
            "quantity-invalid",
            &[
                ("min", MIN_QUANTITY.to_string().as_str()),
                ("max", MAX_QUANTITY.to_string().as_str()),
            ],
        ),
        SendCategory::Error,
    )
}

/// Numbered cart lines with subtotals and the total
pub fn cart_summary(lines: &[CartLine]) -> String {
    let mut text = format!("{}\n{RULE}\n\n", t("cart-title"));

    for (i, line) in lines.iter().enumerate() {
        let _ = writeln!(text, "{}. *{}*", i + 1, line.product_name);
        let _ = writeln!(
            text,
            "   {} × R$ {} = R$ {}\n",
            line.quantity,
            line.unit_price,
            line.subtotal()
        );
    }

    let _ = write!(
        text,
        "{RULE}\n{}",
        t_args("cart-total", &[("total", cart_total(lines).to_string().as_str())])
    );
    text
}

/// Cart summary followed by the cart options menu, optionally headed by a notice
pub fn cart_menu(lines: &[CartLine], notice: Option<String>) -> Outbound {
    let summary = cart_summary(lines);
    let body = match notice {
        Some(notice) => format!("{notice}\n\n{summary}"),
        None => summary,
    };

    Outbound::menu(MenuMessage {
        title: body,
        body: t("cart-options-title"),
        options: vec![
            MenuOption::new("1", t("cart-option-add")),
            MenuOption::new("2", t("cart-option-edit")),
            MenuOption::new("3", t("cart-option-finalize")),
            MenuOption::new("4", t("cart-option-empty")),
            MenuOption::new("5", t("cart-option-menu")),
        ],
        footer: t("cart-options-footer"),
    })
}

pub fn product_added(lines: &[CartLine]) -> Outbound {
    cart_menu(lines, Some(t("cart-product-added")))
}

pub fn item_removed(product: &str, lines: &[CartLine]) -> Outbound {
    cart_menu(
        lines,
        Some(t_args("cart-item-removed", &[("product", product)])),
    )
}

pub fn cart_adjust(lines: &[CartLine]) -> Outbound {
    cart_menu(lines, Some(t("cart-adjust")))
}

pub fn cart_empty() -> Outbound {
    Outbound::text(t("cart-empty"), SendCategory::Text)
}

pub fn cart_nothing_to_remove() -> Outbound {
    Outbound::text(t("cart-nothing-to-remove"), SendCategory::Text)
}

pub fn cart_cannot_finalize() -> Outbound {
    Outbound::text(t("cart-empty-cannot-finalize"), SendCategory::Text)
}

pub fn cart_invalid_option() -> Outbound {
    Outbound::text(t("cart-invalid-option"), SendCategory::Error)
}

pub fn cart_edit_prompt(lines: &[CartLine]) -> Outbound {
    Outbound::text(
        format!("{}\n\n{}", cart_summary(lines), t("cart-edit-prompt")),
        SendCategory::Complex,
    )
}

pub fn cart_item_invalid() -> Outbound {
    Outbound::text(t("cart-item-invalid"), SendCategory::Error)
}

pub fn confirm_prompt(lines: &[CartLine], shop: &ShopProfile) -> Outbound {
    Outbound::text(
        format!(
            "{}\n\n{}",
            cart_summary(lines),
            t_args("confirm-prompt", &[("attendant", shop.attendants.quote.as_str())])
        ),
        SendCategory::Complex,
    )
}

pub fn confirm_invalid() -> Outbound {
    Outbound::text(t("confirm-invalid"), SendCategory::Error)
}

pub fn order_confirmed(order: &Order, shop: &ShopProfile) -> Outbound {
    Outbound::text(
        t_args(
            "order-confirmed",
            &[
                ("order_id", order.id.as_str()),
                ("attendant", shop.attendants.quote.as_str()),
            ],
        ),
        SendCategory::Complex,
    )
}

/// Lookup prompt, listing the customer's most recent orders when there are any
pub fn tracking_prompt(recent: &[Order], shop: &ShopProfile, offset: &FixedOffset) -> Outbound {
    let mut text = t_args("tracking-prompt", &[("attendant", shop.attendants.tracking.as_str())]);

    if !recent.is_empty() {
        let _ = write!(text, "\n\n{}\n", t("tracking-recent-title"));
        for order in recent {
            let date = order.created_at.with_timezone(offset).format("%d/%m/%Y");
            let _ = writeln!(text, "• {} - {}", order.id, date);
        }
        let _ = write!(text, "\n{}", t("tracking-recent-footer"));
    }

    let _ = write!(text, "\n\n{}", t("tracking-back"));
    Outbound::text(text, SendCategory::Complex)
}

pub fn tracking_new_prompt() -> Outbound {
    Outbound::text(t("tracking-new-prompt"), SendCategory::Text)
}

pub fn order_details(order: &Order, shop: &ShopProfile, offset: &FixedOffset) -> Outbound {
    let items = order
        .lines
        .iter()
        .map(|line| format!("• {}x {}", line.quantity, line.product_name))
        .collect::<Vec<_>>()
        .join("\n");
    let date = order
        .created_at
        .with_timezone(offset)
        .format("%d/%m/%Y")
        .to_string();
    let status = format!("{} {}", order.status.emoji(), order.status.label());

    Outbound::text(
        t_args(
            "order-details",
            &[
                ("order_id", order.id.as_str()),
                ("date", date.as_str()),
                ("status", status.as_str()),
                ("total", order.total.to_string().as_str()),
                ("agent", order.assigned_agent.as_str()),
                ("items", items.as_str()),
                ("attendant", shop.attendants.tracking.as_str()),
            ],
        ),
        SendCategory::Complex,
    )
}

pub fn order_not_found(query: &str, shop: &ShopProfile) -> Outbound {
    Outbound::text(
        t_args(
            "order-not-found",
            &[("query", query), ("attendant", shop.attendants.tracking.as_str())],
        ),
        SendCategory::Text,
    )
}

pub fn handoff(shop: &ShopProfile) -> Outbound {
    Outbound::text(
        t_args("handoff", &[("attendant", shop.attendants.general.as_str())]),
        SendCategory::Text,
    )
}

pub fn handoff_forwarded(message: &str, shop: &ShopProfile) -> Outbound {
    Outbound::text(
        t_args(
            "handoff-forwarded",
            &[("attendant", shop.attendants.general.as_str()), ("message", message)],
        ),
        SendCategory::Text,
    )
}

pub fn off_hours_notice(schedule: &WeeklySchedule) -> Outbound {
    Outbound::text(
        t_args("off-hours-notice", &[("hours", schedule_text(schedule).as_str())]),
        SendCategory::Complex,
    )
}

pub fn off_hours_menu() -> Outbound {
    Outbound::menu(MenuMessage {
        title: t("off-hours-menu-title"),
        body: String::new(),
        options: vec![
            MenuOption::new("1", t("off-hours-option-catalog")),
            MenuOption::new("2", t("off-hours-option-instagram")),
            MenuOption::new("3", t("off-hours-option-contact")),
        ],
        footer: t("off-hours-menu-footer"),
    })
}

pub fn off_hours_catalog(catalog: &Catalog) -> Outbound {
    Outbound::text(
        format!(
            "{}\n\n{}",
            render_grouped_catalog(catalog),
            t("off-hours-catalog-note")
        ),
        SendCategory::Complex,
    )
}

pub fn off_hours_instagram(shop: &ShopProfile) -> Outbound {
    Outbound::text(
        t_args("off-hours-instagram", &[("url", shop.instagram_url.as_str())]),
        SendCategory::Text,
    )
}

pub fn off_hours_contact(shop: &ShopProfile, schedule: &WeeklySchedule) -> Outbound {
    Outbound::text(
        t_args(
            "off-hours-contact",
            &[
                ("attendant", shop.attendants.general.as_str()),
                ("whatsapp", shop.attendants.whatsapp.as_str()),
                ("hours", schedule_text(schedule).as_str()),
            ],
        ),
        SendCategory::Text,
    )
}

pub fn off_hours_restricted(shop: &ShopProfile, schedule: &WeeklySchedule) -> Outbound {
    Outbound::text(
        t_args(
            "off-hours-restricted",
            &[
                ("whatsapp", shop.attendants.whatsapp.as_str()),
                ("hours", schedule_text(schedule).as_str()),
            ],
        ),
        SendCategory::Text,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Price;

    #[test]
    fn test_greeting_by_hour() {
        assert!(greeting(8).contains("Bom dia"));
        assert!(greeting(12).contains("Boa tarde"));
        assert!(greeting(18).contains("Boa noite"));
        assert!(greeting(23).contains("Boa noite"));
    }

    #[test]
    fn test_schedule_text_lists_every_day() {
        let text = schedule_text(&WeeklySchedule::default());
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines.len(), 7);
        assert_eq!(lines[0], "Domingo: Fechado");
        assert_eq!(lines[1], "Segunda-feira: 09:00 às 18:00");
        assert_eq!(lines[6], "Sábado: 09:00 às 13:00");
    }

    #[test]
    fn test_grouped_catalog_numbering_matches_lookup() {
        let catalog = Catalog::default();
        let text = render_grouped_catalog(&catalog);

        for n in [1, 8, 10] {
            let name = catalog.lookup_by_index(n).unwrap();
            let expected = format!("{} {} - R$", number_emoji(n), name);
            assert!(text.contains(&expected), "missing line for item {n}");
        }
    }

    #[test]
    fn test_cart_summary_shows_total() {
        let lines = vec![
            CartLine::new("Caneca de Porcelana 325ml", Price::from_cents(3500), 2),
            CartLine::new("Ecobag Personalizada", Price::from_cents(3500), 1),
        ];
        let text = cart_summary(&lines);

        assert!(text.contains("1. *Caneca de Porcelana 325ml*"));
        assert!(text.contains("2 × R$ 35.00 = R$ 70.00"));
        assert!(text.contains("TOTAL: R$ 105.00"));
    }

    #[test]
    fn test_product_details_include_price_and_attributes() {
        let catalog = Catalog::default();
        let text = product_details(&catalog, "Mouse Pad Personalizado");

        assert!(text.contains("R$ 23.00"));
        assert!(text.contains("• Opções: Quadrado, Redondo"));
    }

    #[test]
    fn test_main_menu_has_three_options() {
        let outbound = main_menu(&ShopProfile::default());
        match outbound.payload {
            crate::outbound::OutboundPayload::Menu(menu) => {
                let ids: Vec<_> = menu.options.iter().map(|o| o.id.as_str()).collect();
                assert_eq!(ids, vec!["1", "2", "3"]);
            }
            other => panic!("expected a menu, got {other:?}"),
        }
    }
}
