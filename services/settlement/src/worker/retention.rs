use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use crate::domain::repository::OutboxStore;
use crate::error::SettlementError;

/// Deletes PUBLISHED outbox rows past their retention window, in bounded
/// batches so the sweep never holds long row locks.
pub struct OutboxRetention<O>
where
    O: OutboxStore,
{
    outbox: O,
    keep_for: chrono::Duration,
    batch: u64,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl<O> OutboxRetention<O>
where
    O: OutboxStore,
{
    pub fn new(
        outbox: O,
        keep_for: chrono::Duration,
        batch: u64,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            outbox,
            keep_for,
            batch,
            interval,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!("outbox retention started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.sweep().await {
                        Ok(deleted) if deleted > 0 => {
                            tracing::info!(deleted, "outbox retention sweep done");
                        }
                        Ok(_) => {}
                        Err(err) => tracing::error!(error = %err, "outbox retention sweep failed"),
                    }
                }
                _ = self.shutdown.changed() => break,
            }
        }
        tracing::info!("outbox retention stopped");
    }

    async fn sweep(&self) -> Result<u64, SettlementError> {
        let cutoff = Utc::now() - self.keep_for;
        let mut total = 0u64;
        loop {
            let deleted = self
                .outbox
                .delete_published_before(cutoff, self.batch)
                .await?;
            total += deleted;
            if deleted < self.batch {
                return Ok(total);
            }
        }
    }
}
