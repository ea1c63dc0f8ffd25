/// Subscription-gated delivery state machine
pub mod delivery;
/// Narrow Telegram API surface used by the bot
pub mod gateway;
/// General command and message handlers
pub mod handlers;
/// Storage channel ingestion
pub mod ingest;
/// Per-user last requested code
pub mod session;
/// View layer for UI components (keyboards, messages)
pub mod views;

pub use delivery::{DeliveryOrchestrator, DeliveryOutcome};
pub use session::SessionStore;
