//! Configuration and settings management
//!
//! Loads settings from config files and environment variables.

use crate::bot::gateway::channel_recipient;
use chrono::TimeDelta;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default SQLite database file
pub const DEFAULT_DATABASE_PATH: &str = "videos.db";
/// Entries older than this are deleted (24 hours)
pub const DEFAULT_RETENTION_SECS: u64 = 24 * 60 * 60;
/// Time between expiry sweeps (1 hour)
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60 * 60;
/// How long a user's last requested code is remembered (24 hours)
pub const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;
/// Maximum number of remembered users
pub const DEFAULT_SESSION_MAX_CAPACITY: u64 = 100_000;

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    #[serde(default)]
    pub telegram_token: String,

    /// Channel users must be subscribed to, e.g. `@photos_just`
    pub sponsor_channel: String,

    /// Chat id of the private channel videos are ingested from
    pub storage_channel_id: i64,

    /// Path of the SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Retention window in seconds
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,

    /// Expiry sweep interval in seconds
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Session time to live in seconds
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,

    /// Session cache capacity
    #[serde(default = "default_session_max_capacity")]
    pub session_max_capacity: u64,
}

fn default_database_path() -> String {
    DEFAULT_DATABASE_PATH.to_string()
}

const fn default_retention_secs() -> u64 {
    DEFAULT_RETENTION_SECS
}

const fn default_sweep_interval_secs() -> u64 {
    DEFAULT_SWEEP_INTERVAL_SECS
}

const fn default_session_ttl_secs() -> u64 {
    DEFAULT_SESSION_TTL_SECS
}

const fn default_session_max_capacity() -> u64 {
    DEFAULT_SESSION_MAX_CAPACITY
}

/// Build the layered configuration source.
///
/// Files under `config/` are optional; environment variables win.
///
/// # Errors
///
/// Returns a `ConfigError` if a present source cannot be read.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        // Start off by merging in the "default" configuration file
        .add_source(File::with_name("config/default").required(false))
        // Add in the current environment file
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Add in a local configuration file
        // This file shouldn't be checked into git
        .add_source(File::with_name("config/local").required(false))
        // Add in settings from the environment (with a prefix of APP)
        // Eg.. `APP__DATABASE_PATH=/data/videos.db` would set `database_path`
        .add_source(Environment::with_prefix("APP").separator("__"))
        // Plain environment variables; UPPER_SNAKE_CASE maps to snake_case,
        // empty values count as unset
        .add_source(
            Environment::default()
                .ignore_empty(true)
                .try_parsing(true),
        )
        .build()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use code_vault::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading or validation fails.
    pub fn new() -> Result<Self, ConfigError> {
        let mut settings: Self = build_config()?.try_deserialize()?;

        // Fallback: older deployments export the token as plain `TOKEN`
        if settings.telegram_token.is_empty() {
            if let Ok(val) = std::env::var("TOKEN") {
                if !val.is_empty() {
                    settings.telegram_token = val;
                }
            }
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Deserialize and validate settings from an already built [`Config`].
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if a required key is missing or a value is
    /// out of range.
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let settings: Self = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Message` describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram_token.trim().is_empty() {
            return Err(ConfigError::Message(
                "TELEGRAM_TOKEN (or TOKEN) is required".into(),
            ));
        }
        if self.sponsor_channel.trim().is_empty() {
            return Err(ConfigError::Message("SPONSOR_CHANNEL is required".into()));
        }
        if let Err(e) = channel_recipient(&self.sponsor_channel) {
            return Err(ConfigError::Message(format!(
                "SPONSOR_CHANNEL must be @username or a numeric chat id: {e}"
            )));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::Message(
                "SWEEP_INTERVAL_SECS must be positive".into(),
            ));
        }
        if self.session_ttl_secs == 0 {
            return Err(ConfigError::Message(
                "SESSION_TTL_SECS must be positive".into(),
            ));
        }
        self.retention().map(|_| ())
    }

    /// Retention window as a signed duration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Message` if the value is zero or too large.
    pub fn retention(&self) -> Result<TimeDelta, ConfigError> {
        if self.retention_secs == 0 {
            return Err(ConfigError::Message(
                "RETENTION_SECS must be positive".into(),
            ));
        }
        i64::try_from(self.retention_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .ok_or_else(|| ConfigError::Message("RETENTION_SECS is too large".into()))
    }

    /// Expiry sweep interval.
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Session time to live.
    #[must_use]
    pub const fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}
