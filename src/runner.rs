//! Telegram runtime entrypoint
//!
//! Builds the services, routes updates to the handlers and owns the expiry
//! sweeper for the lifetime of the dispatcher.

use crate::bot::delivery::DeliveryOrchestrator;
use crate::bot::gateway::{DeliveryGateway, TelegramGateway};
use crate::bot::handlers::{self, message_code, Command};
use crate::bot::ingest::AdminIngest;
use crate::bot::session::SessionStore;
use crate::bot::views::CHECK_SUB_CALLBACK;
use crate::clock::{Clock, SystemClock};
use crate::config::Settings;
use crate::storage::{ContentStore, SqliteStore};
use crate::sweeper::Sweeper;
use anyhow::{Context, Result};
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, ChatId};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Run the bot until Ctrl-C.
///
/// Opens the store, starts the expiry sweeper and dispatches updates. The
/// sweeper is cancelled and awaited once the dispatcher returns.
///
/// # Errors
///
/// Returns an error if the store cannot be opened or is unreachable.
pub async fn run_bot(settings: Arc<Settings>) -> Result<()> {
    let store = init_storage(&settings).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let bot = Bot::new(settings.telegram_token.clone());
    let gateway: Arc<dyn DeliveryGateway> = Arc::new(TelegramGateway::new(bot.clone()));

    let sessions = init_sessions(&settings);
    let orchestrator = Arc::new(DeliveryOrchestrator::new(
        store.clone(),
        gateway.clone(),
        sessions,
        settings.sponsor_channel.clone(),
    ));
    let ingest = Arc::new(AdminIngest::new(
        store.clone(),
        gateway,
        clock.clone(),
        ChatId(settings.storage_channel_id),
    ));

    let shutdown = CancellationToken::new();
    let sweeper = Sweeper::new(
        store.clone(),
        clock,
        settings.retention()?,
        settings.sweep_interval(),
    )
    .spawn(shutdown.clone());

    let handler = setup_handler();

    info!(
        "Bot is running (sponsor channel: {}, storage channel: {})...",
        settings.sponsor_channel, settings.storage_channel_id
    );

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![store, orchestrator, ingest, settings])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        error!("Expiry sweeper task failed: {e}");
    }
    info!("Bot stopped.");
    Ok(())
}

async fn init_storage(settings: &Settings) -> Result<Arc<dyn ContentStore>> {
    let store = SqliteStore::open(&settings.database_path)
        .with_context(|| format!("Failed to open database {}", settings.database_path))?;
    store
        .check_connection()
        .await
        .context("Database connection check failed")?;
    info!("SQLite storage initialized at {}.", settings.database_path);
    Ok(Arc::new(store))
}

fn init_sessions(settings: &Settings) -> SessionStore {
    info!(
        "Initializing SessionStore (ttl: {}s, max_size: {})",
        settings.session_ttl_secs, settings.session_max_capacity
    );
    SessionStore::new(settings.session_ttl(), settings.session_max_capacity)
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(
            Update::filter_callback_query()
                .filter(|q: CallbackQuery| q.data.as_deref() == Some(CHECK_SUB_CALLBACK))
                .endpoint(handle_recheck_callback),
        )
        .branch(Update::filter_channel_post().endpoint(handle_channel_post))
        .branch(
            Update::filter_message()
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(handle_command),
                )
                .branch(
                    dptree::filter(|msg: Message| message_code(&msg).is_some())
                        .endpoint(handle_code_message),
                ),
        )
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    store: Arc<dyn ContentStore>,
    orchestrator: Arc<DeliveryOrchestrator>,
) -> Result<(), teloxide::RequestError> {
    let res = match cmd {
        Command::Start => handlers::start(bot, msg).await,
        Command::Healthcheck => handlers::healthcheck(bot, msg, store).await,
        Command::Stats => handlers::stats(bot, msg, store, orchestrator).await,
    };
    if let Err(e) = res {
        error!("Command error: {e:#}");
    }
    respond(())
}

async fn handle_code_message(
    msg: Message,
    orchestrator: Arc<DeliveryOrchestrator>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::handle_code(msg, orchestrator).await {
        error!("Code handler error: {e:#}");
    }
    respond(())
}

async fn handle_recheck_callback(
    bot: Bot,
    q: CallbackQuery,
    orchestrator: Arc<DeliveryOrchestrator>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::handle_recheck(bot, q, orchestrator).await {
        error!("Re-check handler error: {e:#}");
    }
    respond(())
}

async fn handle_channel_post(
    msg: Message,
    ingest: Arc<AdminIngest>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::handle_channel_post(msg, ingest).await {
        error!("Channel post handler error: {e:#}");
    }
    respond(())
}
