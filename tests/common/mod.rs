//! Hermetic fakes shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use code_vault::bot::gateway::{DeliveryGateway, GatewayError, MembershipStatus};
use code_vault::clock::Clock;
use std::collections::HashMap;
use std::sync::Mutex;
use teloxide::types::{ChatId, UserId};

/// Something the bot sent through the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text { chat_id: ChatId, text: String },
    Prompt { chat_id: ChatId, channel: String },
    Video { chat_id: ChatId, asset_ref: String },
}

/// Gateway fake: membership is configured per user, every send is recorded.
#[derive(Default)]
pub struct RecordingGateway {
    members: Mutex<HashMap<u64, MembershipStatus>>,
    membership_fails: Mutex<bool>,
    video_fails: Mutex<bool>,
    sent: Mutex<Vec<Sent>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, user_id: UserId, status: MembershipStatus) {
        self.members
            .lock()
            .expect("members lock")
            .insert(user_id.0, status);
    }

    pub fn subscribe(&self, user_id: UserId) {
        self.set_status(user_id, MembershipStatus::Member);
    }

    pub fn fail_membership(&self, fail: bool) {
        *self.membership_fails.lock().expect("flag lock") = fail;
    }

    pub fn fail_video(&self, fail: bool) {
        *self.video_fails.lock().expect("flag lock") = fail;
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().expect("sent lock").clone()
    }

    pub fn take_sent(&self) -> Vec<Sent> {
        std::mem::take(&mut *self.sent.lock().expect("sent lock"))
    }

    fn record(&self, sent: Sent) {
        self.sent.lock().expect("sent lock").push(sent);
    }
}

#[async_trait]
impl DeliveryGateway for RecordingGateway {
    async fn membership_status(
        &self,
        _channel: &str,
        user_id: UserId,
    ) -> Result<MembershipStatus, GatewayError> {
        if *self.membership_fails.lock().expect("flag lock") {
            return Err(GatewayError::InvalidChannel("unreachable".into()));
        }
        Ok(self
            .members
            .lock()
            .expect("members lock")
            .get(&user_id.0)
            .copied()
            .unwrap_or(MembershipStatus::Left))
    }

    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<(), GatewayError> {
        self.record(Sent::Text {
            chat_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_subscribe_prompt(
        &self,
        chat_id: ChatId,
        _text: &str,
        channel: &str,
    ) -> Result<(), GatewayError> {
        self.record(Sent::Prompt {
            chat_id,
            channel: channel.to_string(),
        });
        Ok(())
    }

    async fn send_video(&self, chat_id: ChatId, asset_ref: &str) -> Result<(), GatewayError> {
        if *self.video_fails.lock().expect("flag lock") {
            return Err(GatewayError::InvalidChannel("video rejected".into()));
        }
        self.record(Sent::Video {
            chat_id,
            asset_ref: asset_ref.to_string(),
        });
        Ok(())
    }
}

/// Clock fake that only moves when told to.
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().expect("clock lock") = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock")
    }
}

/// A fixed point in time used as "now" across tests.
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}
