#![deny(missing_docs)]
//! Code Vault - Telegram video-by-code bot
//!
//! Operators post a video with a 3-digit caption into a private storage
//! channel; users send the code to the bot and receive the video once they
//! are subscribed to the sponsor channel. Entries expire after a retention
//! window.

/// Telegram bot implementation
pub mod bot;
/// Time source abstraction
pub mod clock;
/// The 3-digit content code
pub mod code;
/// Configuration management
pub mod config;
/// Telegram runtime entrypoint
pub mod runner;
/// Storage layer (SQLite)
pub mod storage;
/// Periodic expiry of old entries
pub mod sweeper;
