//! Dead-letter queue watchdog.
//!
//! Consumers park messages they cannot process on `dlq-{queue}` streams;
//! depth growth there means events are being lost downstream. The monitor
//! exports the depths as gauges and alerts on growth, once per high-water
//! mark so a stuck queue does not page every cycle.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Context as _;
use prometheus::{IntGaugeVec, Opts, Registry};
use tokio::sync::watch;

use crate::domain::repository::{AlertNotifier, BrokerAdmin};
use crate::domain::types::Alert;

/// Per-queue alert suppression. Separate from the worker so tests can drive
/// cycles directly and inspect it.
#[derive(Debug, Default)]
pub struct DlqMonitorState {
    last_alerted: HashMap<String, u64>,
}

impl DlqMonitorState {
    /// True when this depth is a new high since the last alert for the queue.
    fn should_alert(&mut self, queue: &str, depth: u64) -> bool {
        if depth == 0 {
            // Queue drained: the next message is news again.
            self.last_alerted.remove(queue);
            return false;
        }
        match self.last_alerted.get(queue) {
            Some(last) if depth <= *last => false,
            _ => {
                self.last_alerted.insert(queue.to_owned(), depth);
                true
            }
        }
    }
}

pub struct DlqMonitor<D, A>
where
    D: BrokerAdmin,
    A: AlertNotifier,
{
    admin: D,
    alerts: A,
    queues: Vec<String>,
    depth_gauge: IntGaugeVec,
    state: DlqMonitorState,
}

impl<D, A> DlqMonitor<D, A>
where
    D: BrokerAdmin,
    A: AlertNotifier,
{
    pub fn new(
        admin: D,
        alerts: A,
        queues: Vec<String>,
        registry: &Registry,
    ) -> Result<Self, anyhow::Error> {
        let depth_gauge = IntGaugeVec::new(
            Opts::new("settlement_dlq_depth", "Messages parked on the DLQ"),
            &["queue"],
        )
        .context("build DLQ depth gauge")?;
        registry
            .register(Box::new(depth_gauge.clone()))
            .context("register DLQ depth gauge")?;
        Ok(Self {
            admin,
            alerts,
            queues,
            depth_gauge,
            state: DlqMonitorState::default(),
        })
    }

    pub async fn run(mut self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(queues = ?self.queues, "DLQ monitor started");
        loop {
            tokio::select! {
                _ = ticker.tick() => self.run_cycle().await,
                _ = shutdown.changed() => break,
            }
        }
        tracing::info!("DLQ monitor stopped");
    }

    pub async fn run_cycle(&mut self) {
        for queue in self.queues.clone() {
            let depth = match self.admin.dlq_depth(&queue).await {
                Ok(depth) => depth,
                Err(err) => {
                    // Broker hiccup; the gauge keeps its last value and the
                    // next cycle tries again.
                    tracing::debug!(queue, error = %err, "DLQ depth query failed");
                    continue;
                }
            };
            self.depth_gauge
                .with_label_values(&[queue.as_str()])
                .set(depth as i64);
            if self.state.should_alert(&queue, depth) {
                self.alerts
                    .notify(
                        Alert::critical("dead-letter queue is growing")
                            .field("queue", &queue)
                            .field("depth", depth),
                    )
                    .await;
            }
        }
    }
}
