//! Per-user "last requested code" memory
//!
//! When a user is asked to subscribe first, the code they sent has to survive
//! until they press the re-check button. This module keeps that association
//! in a bounded in-memory cache; it is lost on restart, in which case the
//! user simply sends the code again.

use crate::code::Code;
use moka::future::Cache;
use std::time::Duration;
use teloxide::types::UserId;
use tracing::debug;

/// Session map from Telegram user to the last code they asked for
///
/// Writes are last-write-wins per user. Entries are evicted after a time to
/// live and when the cache exceeds its capacity.
#[derive(Clone)]
pub struct SessionStore {
    /// Moka cache storing user_id -> last code with automatic TTL
    cache: Cache<u64, Code>,
    ttl: Duration,
}

impl SessionStore {
    /// Creates a new `SessionStore`
    ///
    /// # Arguments
    ///
    /// * `ttl` - How long a remembered code stays valid
    /// * `max_capacity` - Maximum number of remembered users
    ///
    /// # Examples
    ///
    /// ```
    /// use code_vault::bot::session::SessionStore;
    /// use std::time::Duration;
    ///
    /// let sessions = SessionStore::new(Duration::from_secs(86_400), 100_000);
    /// assert_eq!(sessions.ttl().as_secs(), 86_400);
    /// ```
    #[must_use]
    pub fn new(ttl: Duration, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();

        Self { cache, ttl }
    }

    /// Remembers `code` as the latest request of `user_id`, replacing any
    /// previous one.
    pub async fn remember(&self, user_id: UserId, code: Code) {
        debug!("Remembering code {} for user {}", code, user_id.0);
        self.cache.insert(user_id.0, code).await;
    }

    /// Returns the last code `user_id` asked for, if still remembered.
    pub async fn last_code(&self, user_id: UserId) -> Option<Code> {
        self.cache.get(&user_id.0).await
    }

    /// Returns the approximate number of remembered users
    ///
    /// Useful for monitoring and statistics.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Returns the configured time to live.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(raw: &str) -> Code {
        Code::parse(raw).expect("valid code")
    }

    #[tokio::test]
    async fn test_unknown_user_has_no_code() {
        let sessions = SessionStore::new(Duration::from_secs(60), 100);
        assert!(sessions.last_code(UserId(1)).await.is_none());
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let sessions = SessionStore::new(Duration::from_secs(60), 100);

        sessions.remember(UserId(1), code("111")).await;
        sessions.remember(UserId(1), code("222")).await;

        assert_eq!(sessions.last_code(UserId(1)).await, Some(code("222")));
    }

    #[tokio::test]
    async fn test_users_are_independent() {
        let sessions = SessionStore::new(Duration::from_secs(60), 100);

        sessions.remember(UserId(1), code("111")).await;
        sessions.remember(UserId(2), code("222")).await;

        assert_eq!(sessions.last_code(UserId(1)).await, Some(code("111")));
        assert_eq!(sessions.last_code(UserId(2)).await, Some(code("222")));
    }

    #[tokio::test]
    async fn test_entry_count() {
        let sessions = SessionStore::new(Duration::from_secs(60), 100);

        sessions.remember(UserId(1), code("111")).await;
        sessions.remember(UserId(2), code("222")).await;

        // Manually run pending tasks to update the entry count
        sessions.cache.run_pending_tasks().await;

        assert_eq!(sessions.entry_count(), 2);
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let sessions = SessionStore::new(Duration::from_millis(50), 100);

        sessions.remember(UserId(1), code("111")).await;
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(sessions.last_code(UserId(1)).await.is_none());
    }
}
