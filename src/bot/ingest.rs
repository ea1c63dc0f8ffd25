//! Admin ingestion from the private storage channel
//!
//! Operators upload a video into the storage channel with its 3-digit code as
//! the caption. Misposts (wrong channel, no video, bad caption) are routine
//! and are dropped without any reply.

use crate::bot::gateway::DeliveryGateway;
use crate::bot::views::{BotView, DefaultView};
use crate::clock::Clock;
use crate::code::Code;
use crate::storage::{ContentStore, StoreError};
use anyhow::Result;
use std::sync::Arc;
use teloxide::types::{ChatId, Message};
use tracing::{debug, info, warn};

/// The parts of a channel post that ingestion looks at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPost {
    /// Channel the post was made in
    pub chat_id: ChatId,
    /// File id of the attached video, if any
    pub video_file_id: Option<String>,
    /// Post caption, if any
    pub caption: Option<String>,
}

impl From<&Message> for ChannelPost {
    fn from(msg: &Message) -> Self {
        Self {
            chat_id: msg.chat.id,
            video_file_id: msg.video().map(|video| video.file.id.0.clone()),
            caption: msg.caption().map(str::to_string),
        }
    }
}

/// What happened to a channel post
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The video was stored under the code
    Stored(Code),
    /// Posted somewhere other than the storage channel
    WrongChannel,
    /// No video attached
    MissingVideo,
    /// No caption
    MissingCaption,
    /// Caption is not a 3-digit code
    InvalidCode(String),
}

/// Handler for storage channel posts
pub struct AdminIngest {
    store: Arc<dyn ContentStore>,
    gateway: Arc<dyn DeliveryGateway>,
    clock: Arc<dyn Clock>,
    storage_channel: ChatId,
}

impl AdminIngest {
    /// Create a handler accepting posts from `storage_channel` only.
    #[must_use]
    pub fn new(
        store: Arc<dyn ContentStore>,
        gateway: Arc<dyn DeliveryGateway>,
        clock: Arc<dyn Clock>,
        storage_channel: ChatId,
    ) -> Self {
        Self {
            store,
            gateway,
            clock,
            storage_channel,
        }
    }

    /// Validate a post and store its video.
    ///
    /// A failed confirmation message is logged and does not undo the write.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store is unavailable.
    pub async fn handle_post(&self, post: ChannelPost) -> Result<IngestOutcome> {
        if post.chat_id != self.storage_channel {
            debug!("Ignoring channel post from chat {}", post.chat_id.0);
            return Ok(IngestOutcome::WrongChannel);
        }
        let Some(file_id) = post.video_file_id else {
            debug!("Ignoring storage post without video");
            return Ok(IngestOutcome::MissingVideo);
        };
        let Some(caption) = post.caption else {
            warn!("Ignoring storage video without caption");
            return Ok(IngestOutcome::MissingCaption);
        };

        let code = match self
            .store
            .put_raw(&caption, &file_id, self.clock.now())
            .await
        {
            Ok(code) => code,
            Err(StoreError::Validation(e)) => {
                warn!("Ignoring storage video: {e}");
                return Ok(IngestOutcome::InvalidCode(caption));
            }
            Err(e) => return Err(e.into()),
        };

        info!("Stored video under code {code}");

        if let Err(e) = self
            .gateway
            .send_text(self.storage_channel, &DefaultView::video_saved(code.as_str()))
            .await
        {
            warn!("Failed to confirm stored code {code}: {e}");
        }

        Ok(IngestOutcome::Stored(code))
    }
}
