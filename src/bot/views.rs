//! UI components
//!
//! Contains keyboards and text messages shown to users and operators.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use url::Url;

// ─────────────────────────────────────────────────────────────────────────────
// Callback constants
// ─────────────────────────────────────────────────────────────────────────────

/// Callback data for the "check my subscription" button
pub const CHECK_SUB_CALLBACK: &str = "check_sub";

// ─────────────────────────────────────────────────────────────────────────────
// Trait definition
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for bot view rendering
///
/// Provides all text messages shown by the bot.
pub trait BotView {
    /// Reply to `/start`
    fn welcome_message() -> &'static str;

    /// Prompt shown above the subscribe keyboard
    fn subscribe_prompt() -> &'static str;

    /// Label of the button linking to the sponsor channel
    fn subscribe_button() -> &'static str;

    /// Label of the re-check button
    fn recheck_button() -> &'static str;

    /// Alert shown when the re-check still finds no subscription
    fn not_subscribed_alert() -> &'static str;

    /// No video stored under the requested code
    fn code_not_found() -> &'static str;

    /// Re-check succeeded but the requested code is no longer remembered
    fn resend_code() -> &'static str;

    /// Download counter after a successful delivery
    fn download_count(downloads: u64) -> String;

    /// Confirmation posted to the storage channel after ingestion
    fn video_saved(code: &str) -> String;

    /// Reply to `/stats`
    fn stats_message(entries: u64, total_downloads: u64, sessions: u64) -> String;
}

// ─────────────────────────────────────────────────────────────────────────────
// Default implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Default Uzbek-language implementation of `BotView`
pub struct DefaultView;

impl BotView for DefaultView {
    fn welcome_message() -> &'static str {
        "🎬 Kino botga xush kelibsiz!\n\n📩 3 xonali kodni yuboring."
    }

    fn subscribe_prompt() -> &'static str {
        "📢 Avval homiy kanalga obuna bo‘ling:"
    }

    fn subscribe_button() -> &'static str {
        "📢 Homiy kanalga obuna bo‘lish"
    }

    fn recheck_button() -> &'static str {
        "✅ Obunani tekshirish"
    }

    fn not_subscribed_alert() -> &'static str {
        "❌ Hali obuna bo‘lmagansiz"
    }

    fn code_not_found() -> &'static str {
        "❌ Bu kod bo‘yicha video topilmadi."
    }

    fn resend_code() -> &'static str {
        "❗ Kod topilmadi, iltimos qayta yuboring."
    }

    fn download_count(downloads: u64) -> String {
        format!("📊 Yuklab olinganlar soni: {downloads}")
    }

    fn video_saved(code: &str) -> String {
        format!("✅ Video saqlandi | Kod: {code}")
    }

    fn stats_message(entries: u64, total_downloads: u64, sessions: u64) -> String {
        format!(
            "📊 Statistika\n\n\
            • Saqlangan videolar: {entries}\n\
            • Jami yuklab olishlar: {total_downloads}\n\
            • Faol sessiyalar: {sessions}"
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Keyboards
// ─────────────────────────────────────────────────────────────────────────────

/// Public `t.me` link for a channel given as `@username`
///
/// # Examples
///
/// ```
/// use code_vault::bot::views::channel_link;
/// assert_eq!(channel_link("@photos_just"), "https://t.me/photos_just");
/// ```
#[must_use]
pub fn channel_link(channel: &str) -> String {
    format!("https://t.me/{}", channel.trim().trim_start_matches('@'))
}

/// Inline keyboard with a subscribe link and a re-check button
///
/// # Errors
///
/// Returns an error if the channel link is not a valid URL.
pub fn subscribe_keyboard(channel: &str) -> Result<InlineKeyboardMarkup, url::ParseError> {
    let link = Url::parse(&channel_link(channel))?;
    Ok(InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::url(DefaultView::subscribe_button(), link)],
        vec![InlineKeyboardButton::callback(
            DefaultView::recheck_button(),
            CHECK_SUB_CALLBACK,
        )],
    ]))
}
