//! # Localization Module
//!
//! Customer-facing text lives in a Fluent resource (`locales/pt-BR/main.ftl`) embedded at
//! compile time, so the binary never depends on the working directory to find it.

use anyhow::{anyhow, Result};
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use std::sync::OnceLock;
use tracing::{error, warn};
use unic_langid::LanguageIdentifier;

const PT_BR_MESSAGES: &str = include_str!("../locales/pt-BR/main.ftl");

/// Localization manager for the shop's customer-facing messages
pub struct LocalizationManager {
    bundle: FluentBundle<FluentResource>,
}

impl LocalizationManager {
    /// Create a manager with the embedded pt-BR messages
    pub fn new() -> Result<Self> {
        Self::from_source(PT_BR_MESSAGES)
    }

    /// Create a manager from Fluent source text
    pub fn from_source(source: &str) -> Result<Self> {
        let locale: LanguageIdentifier = "pt-BR".parse()?;
        let mut bundle = FluentBundle::new_concurrent(vec![locale]);
        // Unicode isolation marks would leak into WhatsApp/Telegram texts
        bundle.set_use_isolating(false);

        let resource = FluentResource::try_new(source.to_string())
            .map_err(|(_, errors)| anyhow!("Failed to parse Fluent resource: {errors:?}"))?;
        bundle
            .add_resource(resource)
            .map_err(|errors| anyhow!("Failed to add Fluent resource: {errors:?}"))?;

        Ok(Self { bundle })
    }

    /// A manager with no messages; lookups return the missing-translation text
    fn empty() -> Self {
        let mut bundle = FluentBundle::new_concurrent(vec![LanguageIdentifier::default()]);
        bundle.set_use_isolating(false);
        Self { bundle }
    }

    pub fn has_message(&self, key: &str) -> bool {
        self.bundle.has_message(key)
    }

    /// Get a localized message
    pub fn get_message(&self, key: &str, args: Option<&FluentArgs>) -> String {
        let msg = match self.bundle.get_message(key) {
            Some(msg) => msg,
            None => return format!("Missing translation: {}", key),
        };

        let pattern = match msg.value() {
            Some(pattern) => pattern,
            None => return format!("Missing value for key: {}", key),
        };

        let mut errors = Vec::new();
        let value = self.bundle.format_pattern(pattern, args, &mut errors);
        if !errors.is_empty() {
            warn!(key = %key, errors = ?errors, "Fluent formatting reported errors");
        }

        value.into_owned()
    }

    /// Get a localized message with simple string arguments
    pub fn get_message_with_args(&self, key: &str, args: &[(&str, &str)]) -> String {
        let mut fluent_args = FluentArgs::new();
        for (name, value) in args {
            fluent_args.set(*name, FluentValue::from(*value));
        }
        self.get_message(key, Some(&fluent_args))
    }
}

static LOCALIZATION_MANAGER: OnceLock<LocalizationManager> = OnceLock::new();

/// Initialize the global localization manager
///
/// Calling it is optional; the first lookup initializes the manager too. Calling it at
/// startup surfaces a malformed resource as an error instead of a panic.
pub fn init_localization() -> Result<()> {
    if LOCALIZATION_MANAGER.get().is_none() {
        let manager = LocalizationManager::new()?;
        let _ = LOCALIZATION_MANAGER.set(manager);
    }
    Ok(())
}

/// Get the global localization manager
pub fn get_localization_manager() -> &'static LocalizationManager {
    LOCALIZATION_MANAGER.get_or_init(|| {
        LocalizationManager::new().unwrap_or_else(|e| {
            error!(error = %e, "Embedded messages failed to load, every lookup will miss");
            LocalizationManager::empty()
        })
    })
}

/// Convenience function to get a localized message
pub fn t(key: &str) -> String {
    get_localization_manager().get_message(key, None)
}

/// Convenience function to get a localized message with arguments
pub fn t_args(key: &str, args: &[(&str, &str)]) -> String {
    get_localization_manager().get_message_with_args(key, args)
}
