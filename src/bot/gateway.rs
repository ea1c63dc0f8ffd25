//! Delivery gateway: the narrow slice of the Telegram API the bot depends on.
//!
//! The orchestrator and the ingestion handler only talk to Telegram through
//! [`DeliveryGateway`], which keeps them testable without a live bot token.

use crate::bot::views::subscribe_keyboard;
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatMemberKind, FileId, InputFile, Recipient};
use thiserror::Error;

/// Errors returned by gateway calls
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Telegram API or network failure
    #[error("Telegram request failed: {0}")]
    Request(#[from] teloxide::RequestError),
    /// The sponsor channel link could not be built
    #[error("Invalid channel link: {0}")]
    InvalidLink(#[from] url::ParseError),
    /// The channel identifier is neither `@username` nor a numeric id
    #[error("Invalid channel identifier: {0:?}")]
    InvalidChannel(String),
}

/// Membership of a user in a channel, as reported by Telegram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipStatus {
    /// Owner, administrator or regular member
    Member,
    /// The user left the channel or never joined
    Left,
    /// The user was banned from the channel
    Kicked,
    /// Any other status (e.g. restricted) that is neither left nor kicked
    Other,
}

impl From<&ChatMemberKind> for MembershipStatus {
    fn from(kind: &ChatMemberKind) -> Self {
        if kind.is_left() {
            Self::Left
        } else if kind.is_banned() {
            Self::Kicked
        } else if kind.is_owner() || kind.is_administrator() || kind.is_member() {
            Self::Member
        } else {
            Self::Other
        }
    }
}

/// Interface for the messaging platform
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeliveryGateway: Send + Sync {
    /// Look up `user_id`'s membership in `channel`
    async fn membership_status(
        &self,
        channel: &str,
        user_id: UserId,
    ) -> Result<MembershipStatus, GatewayError>;

    /// Send a plain text message
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<(), GatewayError>;

    /// Send `text` with a subscribe link to `channel` and a re-check button
    async fn send_subscribe_prompt(
        &self,
        chat_id: ChatId,
        text: &str,
        channel: &str,
    ) -> Result<(), GatewayError>;

    /// Send a previously uploaded video by its file id
    async fn send_video(&self, chat_id: ChatId, asset_ref: &str) -> Result<(), GatewayError>;
}

/// Telegram Bot API implementation of [`DeliveryGateway`]
#[derive(Clone)]
pub struct TelegramGateway {
    bot: Bot,
}

impl TelegramGateway {
    /// Wrap a bot client.
    #[must_use]
    pub const fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

/// Turn a configured channel into a request recipient.
///
/// `@username` addresses a public channel; anything else must be a numeric
/// chat id such as `-1001234567890`.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidChannel`] for other input.
pub fn channel_recipient(channel: &str) -> Result<Recipient, GatewayError> {
    let channel = channel.trim();
    if channel.starts_with('@') {
        return Ok(Recipient::ChannelUsername(channel.to_string()));
    }
    channel
        .parse::<i64>()
        .map(|id| Recipient::Id(ChatId(id)))
        .map_err(|_| GatewayError::InvalidChannel(channel.to_string()))
}

#[async_trait]
impl DeliveryGateway for TelegramGateway {
    async fn membership_status(
        &self,
        channel: &str,
        user_id: UserId,
    ) -> Result<MembershipStatus, GatewayError> {
        let member = self
            .bot
            .get_chat_member(channel_recipient(channel)?, user_id)
            .await?;
        Ok(MembershipStatus::from(&member.kind))
    }

    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<(), GatewayError> {
        self.bot.send_message(chat_id, text).await?;
        Ok(())
    }

    async fn send_subscribe_prompt(
        &self,
        chat_id: ChatId,
        text: &str,
        channel: &str,
    ) -> Result<(), GatewayError> {
        self.bot
            .send_message(chat_id, text)
            .reply_markup(subscribe_keyboard(channel)?)
            .await?;
        Ok(())
    }

    async fn send_video(&self, chat_id: ChatId, asset_ref: &str) -> Result<(), GatewayError> {
        self.bot
            .send_video(chat_id, InputFile::file_id(FileId(asset_ref.to_string())))
            .await?;
        Ok(())
    }
}
