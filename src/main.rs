use anyhow::{Context, Result};
use std::env;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

use order_intake::bot::{self, DialogueManager, TelegramMessenger};
use order_intake::catalog::Catalog;
use order_intake::config::BotConfig;
use order_intake::localization::init_localization;
use order_intake::scheduler::{OutboundScheduler, SentRegistry};
use order_intake::store::Storage;
use order_intake::{nudge, reaper};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    init_tracing();

    info!("Starting order intake bot");

    init_localization().context("Failed to load message catalog")?;

    let bot_token = env::var("TELEGRAM_BOT_TOKEN").context("TELEGRAM_BOT_TOKEN must be set")?;
    let config = Arc::new(BotConfig::from_env().context("Invalid configuration")?);

    let catalog = match &config.catalog_path {
        Some(path) => Catalog::from_json_file(path)?,
        None => Catalog::default(),
    };
    info!(products = catalog.len(), "Catalog loaded");
    let catalog = Arc::new(catalog);

    let storage = Storage::open(&config.storage).await?;

    let bot = Bot::new(bot_token);
    let messenger = Arc::new(TelegramMessenger::new(bot.clone()));
    let scheduler = Arc::new(OutboundScheduler::new(
        messenger,
        &config,
        Arc::new(SentRegistry::new()),
    ));

    tokio::spawn(scheduler.clone().run());
    tokio::spawn(reaper::run_reaper(
        storage.sessions.clone(),
        config.reaper.clone(),
    ));
    if config.nudge.enabled {
        tokio::spawn(nudge::run_nudges(
            storage.sessions.clone(),
            scheduler.clone(),
            config.nudge.clone(),
            config.render_mode,
        ));
    }

    let manager = Arc::new(DialogueManager::new(
        config.clone(),
        catalog,
        storage,
        scheduler,
    ));

    info!(
        shop = %config.shop.name,
        render_mode = ?config.render_mode,
        anti_abuse = config.anti_abuse,
        "Bot initialized, starting dispatcher"
    );

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(bot::message_handler))
        .branch(Update::filter_callback_query().endpoint(bot::callback_handler));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![manager])
        .default_handler(|_| async {})
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
