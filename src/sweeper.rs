//! Periodic expiry of old entries
//!
//! The sweeper runs on the tokio runtime for the lifetime of the process and
//! stops when its [`CancellationToken`] is cancelled.

use crate::clock::Clock;
use crate::storage::{ContentStore, StoreError};
use chrono::TimeDelta;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Deletes entries older than the retention window on a fixed interval
pub struct Sweeper {
    store: Arc<dyn ContentStore>,
    clock: Arc<dyn Clock>,
    retention: TimeDelta,
    interval: Duration,
}

impl Sweeper {
    /// Create a sweeper.
    #[must_use]
    pub fn new(
        store: Arc<dyn ContentStore>,
        clock: Arc<dyn Clock>,
        retention: TimeDelta,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            retention,
            interval,
        }
    }

    /// Run one sweep and return how many entries were deleted.
    ///
    /// # Errors
    ///
    /// Returns the store error if the delete fails.
    pub async fn sweep_once(&self) -> Result<u64, StoreError> {
        let now = self.clock.now();
        let Some(cutoff) = now.checked_sub_signed(self.retention) else {
            return Ok(0);
        };
        let deleted = self.store.delete_older_than(cutoff).await?;
        if deleted > 0 {
            info!("Expired {deleted} entries created before {cutoff}");
        } else {
            debug!("Sweep found nothing older than {cutoff}");
        }
        Ok(deleted)
    }

    /// Start the sweep loop on the runtime.
    ///
    /// The first sweep happens immediately. A failed sweep is logged and the
    /// loop keeps going.
    #[must_use]
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }

    async fn run(self, shutdown: CancellationToken) {
        info!(
            "Expiry sweeper started (retention: {}s, interval: {}s)",
            self.retention.num_seconds(),
            self.interval.as_secs()
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("Expiry sweeper stopped.");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        error!("Expiry sweep failed: {e}");
                    }
                }
            }
        }
    }
}
