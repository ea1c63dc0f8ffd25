//! Subscription-gated delivery of videos by code
//!
//! A request moves through `Received -> SubscriptionCheck -> (Gated | Deliver)`.
//! From `Gated` the user may press the re-check button any number of times,
//! which re-enters `SubscriptionCheck` with the remembered code.

use crate::bot::gateway::{DeliveryGateway, GatewayError, MembershipStatus};
use crate::bot::session::SessionStore;
use crate::bot::views::{BotView, DefaultView};
use crate::code::Code;
use crate::storage::{ContentStore, StoreError};
use anyhow::Result;
use std::sync::Arc;
use teloxide::types::{ChatId, UserId};
use tracing::{info, warn};

/// Result of asking the gateway about a user's subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionCheck {
    /// Owner, administrator or member
    Member,
    /// Left the sponsor channel
    Left,
    /// Banned from the sponsor channel
    Kicked,
    /// Some other non-left, non-kicked status
    Other,
    /// The gateway call failed
    Unknown,
}

impl SubscriptionCheck {
    /// Whether content may be delivered. `Unknown` fails closed.
    #[must_use]
    pub const fn may_receive(self) -> bool {
        matches!(self, Self::Member | Self::Other)
    }
}

impl From<Result<MembershipStatus, GatewayError>> for SubscriptionCheck {
    fn from(result: Result<MembershipStatus, GatewayError>) -> Self {
        match result {
            Ok(MembershipStatus::Member) => Self::Member,
            Ok(MembershipStatus::Left) => Self::Left,
            Ok(MembershipStatus::Kicked) => Self::Kicked,
            Ok(MembershipStatus::Other) => Self::Other,
            Err(_) => Self::Unknown,
        }
    }
}

/// Terminal state of one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Not subscribed; the subscribe prompt was sent
    Gated,
    /// Re-check found no subscription; the caller shows an alert
    StillGated,
    /// Subscribed, but nothing is stored under the code
    NotFound(Code),
    /// Subscribed via re-check, but no code is remembered for the user
    NoRememberedCode,
    /// The video was sent and the counter incremented
    Delivered {
        /// The delivered code
        code: Code,
        /// Download count after this delivery
        downloads: u64,
    },
}

/// Glue between the content store and the delivery gateway
pub struct DeliveryOrchestrator {
    store: Arc<dyn ContentStore>,
    gateway: Arc<dyn DeliveryGateway>,
    sessions: SessionStore,
    sponsor_channel: String,
}

impl DeliveryOrchestrator {
    /// Create an orchestrator gating on `sponsor_channel`.
    #[must_use]
    pub fn new(
        store: Arc<dyn ContentStore>,
        gateway: Arc<dyn DeliveryGateway>,
        sessions: SessionStore,
        sponsor_channel: impl Into<String>,
    ) -> Self {
        Self {
            store,
            gateway,
            sessions,
            sponsor_channel: sponsor_channel.into(),
        }
    }

    /// Session map used to resume after a re-check.
    #[must_use]
    pub const fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Handle a code sent by a user.
    ///
    /// # Errors
    ///
    /// Returns an error if a gateway send fails or the store is unavailable.
    pub async fn handle_code(
        &self,
        user_id: UserId,
        chat_id: ChatId,
        code: Code,
    ) -> Result<DeliveryOutcome> {
        info!("User {} requested code {}", user_id.0, code);
        self.sessions.remember(user_id, code.clone()).await;

        if !self.check_subscription(user_id).await.may_receive() {
            self.gateway
                .send_subscribe_prompt(
                    chat_id,
                    DefaultView::subscribe_prompt(),
                    &self.sponsor_channel,
                )
                .await?;
            info!("User {} is not subscribed, sent subscribe prompt", user_id.0);
            return Ok(DeliveryOutcome::Gated);
        }

        self.deliver(chat_id, code).await
    }

    /// Handle a press of the re-check button.
    ///
    /// When the user is still not subscribed nothing is sent here; the caller
    /// answers the callback query with an alert.
    ///
    /// # Errors
    ///
    /// Returns an error if a gateway send fails or the store is unavailable.
    pub async fn recheck(&self, user_id: UserId, chat_id: ChatId) -> Result<DeliveryOutcome> {
        if !self.check_subscription(user_id).await.may_receive() {
            info!("Re-check for user {}: still not subscribed", user_id.0);
            return Ok(DeliveryOutcome::StillGated);
        }

        let Some(code) = self.sessions.last_code(user_id).await else {
            self.gateway
                .send_text(chat_id, DefaultView::resend_code())
                .await?;
            return Ok(DeliveryOutcome::NoRememberedCode);
        };

        self.deliver(chat_id, code).await
    }

    /// The single place where gateway failures turn into "not subscribed".
    async fn check_subscription(&self, user_id: UserId) -> SubscriptionCheck {
        let result = self
            .gateway
            .membership_status(&self.sponsor_channel, user_id)
            .await;

        if let Err(e) = &result {
            warn!(
                user_id = user_id.0,
                error = %e,
                "Subscription check failed, treating user as not subscribed"
            );
        }
        SubscriptionCheck::from(result)
    }

    async fn deliver(&self, chat_id: ChatId, code: Code) -> Result<DeliveryOutcome> {
        let entry = match self.store.get(&code).await {
            Ok(entry) => entry,
            Err(StoreError::NotFound(_)) => {
                self.gateway
                    .send_text(chat_id, DefaultView::code_not_found())
                    .await?;
                return Ok(DeliveryOutcome::NotFound(code));
            }
            Err(e) => return Err(e.into()),
        };

        self.gateway.send_video(chat_id, &entry.asset_ref).await?;

        let downloads = match self.store.record_delivery(&code).await {
            Ok(n) => n,
            Err(StoreError::NotFound(_)) => {
                // Expired or replaced between lookup and increment.
                warn!("Entry {code} vanished after delivery, reporting read count");
                entry.downloads + 1
            }
            Err(e) => return Err(e.into()),
        };

        self.gateway
            .send_text(chat_id, &DefaultView::download_count(downloads))
            .await?;

        info!("Delivered code {code} to chat {} (downloads: {downloads})", chat_id.0);
        Ok(DeliveryOutcome::Delivered { code, downloads })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::gateway::MockDeliveryGateway;
    use crate::storage::SqliteStore;
    use chrono::Utc;
    use mockall::predicate::eq;
    use std::time::Duration;

    fn code(raw: &str) -> Code {
        Code::parse(raw).expect("valid code")
    }

    fn orchestrator(store: Arc<SqliteStore>, gateway: MockDeliveryGateway) -> DeliveryOrchestrator {
        DeliveryOrchestrator::new(
            store,
            Arc::new(gateway),
            SessionStore::new(Duration::from_secs(60), 100),
            "@sponsor",
        )
    }

    #[test]
    fn test_fail_closed_policy() {
        assert!(SubscriptionCheck::Member.may_receive());
        assert!(SubscriptionCheck::Other.may_receive());
        assert!(!SubscriptionCheck::Left.may_receive());
        assert!(!SubscriptionCheck::Kicked.may_receive());
        assert!(!SubscriptionCheck::Unknown.may_receive());
    }

    #[tokio::test]
    async fn test_gateway_error_gates_user() {
        let store = Arc::new(SqliteStore::open_in_memory().expect("store"));
        store.put(&code("007"), "vid123", Utc::now()).await.expect("put");

        let mut gateway = MockDeliveryGateway::new();
        gateway
            .expect_membership_status()
            .returning(|_, _| Err(GatewayError::InvalidChannel("boom".to_string())));
        gateway
            .expect_send_subscribe_prompt()
            .withf(|chat, _, channel| *chat == ChatId(10) && channel == "@sponsor")
            .times(1)
            .returning(|_, _, _| Ok(()));
        gateway.expect_send_video().never();

        let orchestrator = orchestrator(store.clone(), gateway);
        let outcome = orchestrator
            .handle_code(UserId(1), ChatId(10), code("007"))
            .await
            .expect("handled");

        assert_eq!(outcome, DeliveryOutcome::Gated);
        assert_eq!(store.get(&code("007")).await.expect("get").downloads, 0);
    }

    #[tokio::test]
    async fn test_member_receives_video_and_count() {
        let store = Arc::new(SqliteStore::open_in_memory().expect("store"));
        store.put(&code("007"), "vid123", Utc::now()).await.expect("put");

        let mut gateway = MockDeliveryGateway::new();
        gateway
            .expect_membership_status()
            .with(eq("@sponsor"), eq(UserId(1)))
            .returning(|_, _| Ok(MembershipStatus::Member));
        gateway
            .expect_send_video()
            .withf(|chat, asset| *chat == ChatId(10) && asset == "vid123")
            .times(1)
            .returning(|_, _| Ok(()));
        gateway
            .expect_send_text()
            .withf(|_, text| text == DefaultView::download_count(1))
            .times(1)
            .returning(|_, _| Ok(()));

        let orchestrator = orchestrator(store, gateway);
        let outcome = orchestrator
            .handle_code(UserId(1), ChatId(10), code("007"))
            .await
            .expect("handled");

        assert_eq!(
            outcome,
            DeliveryOutcome::Delivered {
                code: code("007"),
                downloads: 1
            }
        );
    }

    #[tokio::test]
    async fn test_failed_video_send_does_not_count() {
        let store = Arc::new(SqliteStore::open_in_memory().expect("store"));
        store.put(&code("007"), "vid123", Utc::now()).await.expect("put");

        let mut gateway = MockDeliveryGateway::new();
        gateway
            .expect_membership_status()
            .returning(|_, _| Ok(MembershipStatus::Member));
        gateway
            .expect_send_video()
            .returning(|_, _| Err(GatewayError::InvalidChannel("down".to_string())));
        gateway.expect_send_text().never();

        let orchestrator = orchestrator(store.clone(), gateway);
        let result = orchestrator
            .handle_code(UserId(1), ChatId(10), code("007"))
            .await;

        assert!(result.is_err());
        assert_eq!(store.get(&code("007")).await.expect("get").downloads, 0);
    }

    #[tokio::test]
    async fn test_recheck_still_gated_sends_nothing() {
        let store = Arc::new(SqliteStore::open_in_memory().expect("store"));

        let mut gateway = MockDeliveryGateway::new();
        gateway
            .expect_membership_status()
            .returning(|_, _| Ok(MembershipStatus::Left));
        gateway.expect_send_text().never();
        gateway.expect_send_subscribe_prompt().never();

        let orchestrator = orchestrator(store, gateway);
        orchestrator.sessions().remember(UserId(1), code("007")).await;
        let outcome = orchestrator
            .recheck(UserId(1), ChatId(10))
            .await
            .expect("handled");

        assert_eq!(outcome, DeliveryOutcome::StillGated);
    }
}
