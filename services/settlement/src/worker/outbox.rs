//! Outbox publishing: an immediate wakeup after each commit plus a periodic
//! sweep for rows whose wakeup was lost.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Notify, watch};

use crate::domain::repository::{EventBroker, OutboxStore};
use crate::domain::types::OutboxRecord;
use crate::error::SettlementError;

/// Publishes one outbox row to the broker and settles its status.
///
/// Used by both delivery paths, so push and poll share identical semantics:
/// broker ack then a compare-and-set to PUBLISHED; a lost compare-and-set
/// means a concurrent publisher won and the broker deduplicated by event id.
pub struct OutboxPublisher<O, B>
where
    O: OutboxStore,
    B: EventBroker,
{
    pub outbox: O,
    pub broker: B,
}

impl<O, B> OutboxPublisher<O, B>
where
    O: OutboxStore,
    B: EventBroker,
{
    pub async fn publish(&self, record: &OutboxRecord) -> Result<(), SettlementError> {
        match self
            .broker
            .publish(&record.subject(), record.event_id, &record.payload)
            .await
        {
            Ok(()) => {
                let won = self.outbox.mark_published(record.event_id).await?;
                if !won {
                    tracing::debug!(
                        event_id = %record.event_id,
                        "outbox row already published by a concurrent publisher"
                    );
                }
                Ok(())
            }
            Err(broker_err) => {
                tracing::warn!(
                    event_id = %record.event_id,
                    subject = %record.subject(),
                    error = %broker_err,
                    "outbox publish failed"
                );
                self.outbox
                    .mark_send_failed(record.event_id, &broker_err.to_string())
                    .await
            }
        }
    }
}

pub struct RelayConfig {
    pub poll_interval: Duration,
    /// How long an INIT row may sit before the periodic sweep picks it up.
    /// A wakeup scan ignores this and takes every INIT row immediately.
    pub init_stale_after: chrono::Duration,
    pub retry_cap: i32,
    pub batch: u64,
}

/// The hybrid outbox relay.
///
/// Commits signal `wakeup` after their transaction lands; the relay then
/// scans with no staleness threshold, publishing the fresh rows right away.
/// The periodic tick is the safety net: it applies `init_stale_after` so a
/// row whose wakeup never arrived still goes out, and retries SEND_FAIL rows
/// up to `retry_cap`. Beyond the cap a row stays in the table for operators;
/// the DLQ monitor covers the consumer side.
pub struct OutboxRelay<O, B>
where
    O: OutboxStore,
    B: EventBroker,
{
    publisher: OutboxPublisher<O, B>,
    config: RelayConfig,
    wakeup: Arc<Notify>,
    shutdown: watch::Receiver<bool>,
}

impl<O, B> OutboxRelay<O, B>
where
    O: OutboxStore,
    B: EventBroker,
{
    pub fn new(
        outbox: O,
        broker: B,
        config: RelayConfig,
        wakeup: Arc<Notify>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            publisher: OutboxPublisher { outbox, broker },
            config,
            wakeup,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!("outbox relay started");
        loop {
            let stale_before = tokio::select! {
                _ = ticker.tick() => Utc::now() - self.config.init_stale_after,
                _ = self.wakeup.notified() => Utc::now(),
                _ = self.shutdown.changed() => break,
            };
            if let Err(err) = self.sweep_once(stale_before).await {
                tracing::error!(error = %err, "outbox sweep failed");
            }
        }
        // Let the final batch go out before the process exits.
        if let Err(err) = self.sweep_once(Utc::now()).await {
            tracing::error!(error = %err, "final outbox sweep failed");
        }
        tracing::info!("outbox relay stopped");
    }

    /// One batch per pass. Rows freshly marked SEND_FAIL wait for the next
    /// tick instead of being hammered in a loop.
    async fn sweep_once(
        &self,
        stale_before: chrono::DateTime<Utc>,
    ) -> Result<(), SettlementError> {
        let records = self
            .publisher
            .outbox
            .find_publishable(stale_before, self.config.retry_cap, self.config.batch)
            .await?;
        for record in &records {
            self.publisher.publish(record).await?;
        }
        Ok(())
    }
}
