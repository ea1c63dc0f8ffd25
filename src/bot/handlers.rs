//! Command, message and callback handlers
//!
//! Thin adapters from teloxide updates to the delivery and ingestion services.

use crate::bot::delivery::{DeliveryOrchestrator, DeliveryOutcome};
use crate::bot::ingest::{AdminIngest, ChannelPost};
use crate::bot::views::{BotView, DefaultView};
use crate::code::Code;
use crate::storage::ContentStore;
use anyhow::Result;
use std::sync::Arc;
use teloxide::{prelude::*, utils::command::BotCommands};
use tracing::{debug, info, warn};

/// Safe extraction of user ID from a message.
/// Returns 0 if the user information is missing.
pub fn get_user_id_safe(msg: &Message) -> u64 {
    msg.from.as_ref().map_or(0, |u| u.id.0)
}

/// Code carried by a text message, if the whole text is a 3-digit code.
#[must_use]
pub fn message_code(msg: &Message) -> Option<Code> {
    msg.text().and_then(text_code)
}

/// Code in user text. Surrounding whitespace makes the text a non-code.
#[must_use]
pub fn text_code(text: &str) -> Option<Code> {
    Code::parse_exact(text).ok()
}

/// Alert text for the re-check callback answer.
///
/// `None` means a plain answer that only stops the client spinner.
#[must_use]
pub fn callback_answer(outcome: &Result<DeliveryOutcome>) -> Option<&'static str> {
    match outcome {
        Ok(DeliveryOutcome::StillGated) => Some(DefaultView::not_subscribed_alert()),
        _ => None,
    }
}

/// Supported commands for the bot
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Start the bot and show welcome message
    #[command(description = "Start the bot.")]
    Start,
    /// Check bot health
    #[command(description = "Check bot health.")]
    Healthcheck,
    /// Show bot statistics
    #[command(description = "Show bot statistics.")]
    Stats,
}

/// Start handler
///
/// # Errors
///
/// Returns an error if the welcome message cannot be sent.
pub async fn start(bot: Bot, msg: Message) -> Result<()> {
    info!("User {} initiated /start command.", get_user_id_safe(&msg));
    bot.send_message(msg.chat.id, DefaultView::welcome_message())
        .await?;
    Ok(())
}

/// Healthcheck handler
///
/// # Errors
///
/// Returns an error if the healthcheck response cannot be sent.
pub async fn healthcheck(bot: Bot, msg: Message, store: Arc<dyn ContentStore>) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    info!("Healthcheck command received from user {user_id}.");
    let status = match store.check_connection().await {
        Ok(()) => "OK",
        Err(_) => "DEGRADED: storage unavailable",
    };
    bot.send_message(msg.chat.id, status).await?;
    info!("Responded '{status}' to healthcheck from user {user_id}.");
    Ok(())
}

/// Stats handler - shows stored entries, downloads and session count
///
/// # Errors
///
/// Returns an error if the store cannot be read or the reply cannot be sent.
pub async fn stats(
    bot: Bot,
    msg: Message,
    store: Arc<dyn ContentStore>,
    orchestrator: Arc<DeliveryOrchestrator>,
) -> Result<()> {
    info!("Stats command received from user {}.", get_user_id_safe(&msg));

    let stats = store.stats().await?;
    let text = DefaultView::stats_message(
        stats.entries,
        stats.total_downloads,
        orchestrator.sessions().entry_count(),
    );
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

/// Code message handler
///
/// # Errors
///
/// Returns an error if delivery fails.
pub async fn handle_code(msg: Message, orchestrator: Arc<DeliveryOrchestrator>) -> Result<()> {
    let Some(code) = message_code(&msg) else {
        return Ok(());
    };
    let Some(user) = msg.from.as_ref() else {
        debug!("Ignoring code {code} from message without sender");
        return Ok(());
    };

    let outcome = orchestrator.handle_code(user.id, msg.chat.id, code).await?;
    debug!("Code request from user {} finished: {outcome:?}", user.id.0);
    Ok(())
}

/// Re-check button handler
///
/// Every callback query is answered once; the answer carries an alert when
/// the user is still not subscribed.
///
/// # Errors
///
/// Returns an error if delivery fails.
pub async fn handle_recheck(
    bot: Bot,
    q: CallbackQuery,
    orchestrator: Arc<DeliveryOrchestrator>,
) -> Result<()> {
    let user_id = q.from.id;
    let Some(chat_id) = q.message.as_ref().map(|msg| msg.chat().id) else {
        if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
            warn!("Failed to answer callback query from user {}: {e}", user_id.0);
        }
        return Err(anyhow::anyhow!("Callback message missing chat id"));
    };

    let outcome = orchestrator.recheck(user_id, chat_id).await;

    let mut answer = bot.answer_callback_query(q.id.clone());
    if let Some(alert) = callback_answer(&outcome) {
        answer = answer.text(alert).show_alert(true);
    }
    if let Err(e) = answer.await {
        warn!("Failed to answer callback query from user {}: {e}", user_id.0);
    }

    let outcome = outcome?;
    debug!("Re-check from user {} finished: {outcome:?}", user_id.0);
    Ok(())
}

/// Channel post handler
///
/// # Errors
///
/// Returns an error if the store is unavailable.
pub async fn handle_channel_post(msg: Message, ingest: Arc<AdminIngest>) -> Result<()> {
    let outcome = ingest.handle_post(ChannelPost::from(&msg)).await?;
    debug!("Channel post {} handled: {outcome:?}", msg.id.0);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(raw: &str) -> Code {
        Code::parse(raw).expect("valid code")
    }

    #[test]
    fn test_text_code_requires_exact_digits() {
        assert_eq!(text_code("007"), Some(code("007")));
        for raw in [" 007", "007 ", "\t007\n", "007\n", "0077", "hello"] {
            assert_eq!(text_code(raw), None, "{raw:?}");
        }
    }

    #[test]
    fn test_still_gated_answers_with_alert() {
        assert_eq!(
            callback_answer(&Ok(DeliveryOutcome::StillGated)),
            Some(DefaultView::not_subscribed_alert())
        );
    }

    #[test]
    fn test_other_outcomes_answer_plainly() {
        let outcomes = [
            Ok(DeliveryOutcome::Delivered {
                code: code("007"),
                downloads: 1,
            }),
            Ok(DeliveryOutcome::NotFound(code("999"))),
            Ok(DeliveryOutcome::NoRememberedCode),
            Ok(DeliveryOutcome::Gated),
            Err(anyhow::anyhow!("store unavailable")),
        ];
        for outcome in &outcomes {
            assert_eq!(callback_answer(outcome), None, "{outcome:?}");
        }
    }
}
