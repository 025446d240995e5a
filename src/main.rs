use std::sync::Arc;

use anyhow::Result;
use dotenvy::dotenv;
use teloxide::prelude::*;
use teloxide::update_listeners::Polling;

use ecotrack_bot::core::web_server::run_web_server;
use ecotrack_bot::core::{config, logging, Config};
use ecotrack_bot::ecotrack::EcoClient;
use ecotrack_bot::services::{LookupService, TrackService};
use ecotrack_bot::telegram::auth::AllowList;
use ecotrack_bot::telegram::bot::{create_bot, setup_bot_commands};
use ecotrack_bot::telegram::handlers::{schema, HandlerDeps};
use ecotrack_bot::telegram::session::SessionStore;

/// Main entry point for the order bot.
///
/// # Errors
/// Returns an error if initialization fails (logging, configuration, bot
/// creation).
#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env if present
    let _ = dotenv();

    // Initialize logger (console + file)
    logging::init_logger(config::LOG_FILE_PATH)?;

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Configuration error: {:#}", e);
            anyhow::bail!("configuration error: {:#}", e);
        }
    };
    config.log_summary();

    let eco = Arc::new(EcoClient::new(
        config.ecotrack_base_url.clone(),
        &config.ecotrack_api_key,
    )?);
    let lookup = Arc::new(LookupService::new(Arc::clone(&eco)));
    let track = Arc::new(TrackService::new(Arc::clone(&eco), config.ecotrack_api_key.clone()));
    let sessions = Arc::new(SessionStore::new());
    let allow_list = Arc::new(AllowList::new(config.allowed_user_ids.clone()));

    let bot = create_bot()?;
    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to register bot commands: {}", e);
    }

    // Lookup API + web form assets run alongside the bot
    let web_lookup = Arc::clone(&lookup);
    let port = config.port;
    tokio::spawn(async move {
        if let Err(e) = run_web_server(port, web_lookup).await {
            log::error!("Web server exited: {}", e);
        }
    });

    let deps = HandlerDeps {
        eco,
        lookup,
        track,
        sessions,
        allow_list,
        web_app_url: config.web_app_url.clone(),
    };

    log::info!("Starting bot with long polling");
    let listener = Polling::builder(bot.clone()).drop_pending_updates().build();

    Dispatcher::builder(bot, schema(deps))
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("An error from the update listener"),
        )
        .await;

    log::info!("Dispatcher shutdown gracefully");
    Ok(())
}
