//! Time source

use chrono::{DateTime, Utc};

/// Source of the current UTC time.
///
/// Ingestion and the expiry sweep read time through this trait so tests can
/// pin it.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
