//! Reconciliation: resolves payments stuck in PENDING against the provider.
//!
//! A payment goes stale when the confirm request died between the provider
//! charge and the local commit, or never reached the provider at all. The
//! money was never credited locally in either case, so resolution is always
//! cancel-shaped: refund the provider if it charged, then close the row.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use wonpay_domain::event::DomainEvent;
use wonpay_domain::payment::PaymentStatus;

use crate::domain::gateway::ProviderStatus;
use crate::domain::repository::{AlertNotifier, PaymentGateway, SettlementStore};
use crate::domain::types::{Alert, Payment};
use crate::error::SettlementError;

const RECONCILE_REFUND_REASON: &str = "reconciliation: confirm never settled locally";
const RECONCILE_VOID_REASON: &str = "reconciliation: provider reports no completed charge";

/// Outcome counts of one reconciliation cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    pub resolved: u64,
    pub skipped: u64,
    pub failed: u64,
}

pub struct ReconcileWorker<S, G, A>
where
    S: SettlementStore,
    G: PaymentGateway,
    A: AlertNotifier,
{
    pub store: S,
    pub gateway: G,
    pub alerts: A,
    /// Minimum age before a PENDING payment counts as stale.
    pub stale_after: chrono::Duration,
    pub batch: u64,
}

impl<S, G, A> ReconcileWorker<S, G, A>
where
    S: SettlementStore,
    G: PaymentGateway,
    A: AlertNotifier,
{
    pub async fn run(self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!("reconciliation scheduler started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.run_cycle().await {
                        tracing::error!(error = %err, "reconciliation cycle failed");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
        tracing::info!("reconciliation scheduler stopped");
    }

    pub async fn run_cycle(&self) -> Result<ReconcileReport, SettlementError> {
        let older_than = Utc::now() - self.stale_after;
        let stale = self.store.find_stale_pending(older_than, self.batch).await?;
        let mut report = ReconcileReport::default();
        for payment in &stale {
            match self.resolve(payment).await {
                Ok(true) => report.resolved += 1,
                Ok(false) => report.skipped += 1,
                Err(err) => {
                    report.failed += 1;
                    tracing::warn!(
                        order_id = %payment.order_id,
                        error = %err,
                        "reconciliation of payment failed"
                    );
                }
            }
        }
        if report != ReconcileReport::default() {
            tracing::info!(
                resolved = report.resolved,
                skipped = report.skipped,
                failed = report.failed,
                "reconciliation cycle done"
            );
        }
        Ok(report)
    }

    /// `Ok(true)` means the payment reached a terminal state this cycle;
    /// `Ok(false)` means it was deliberately left for the next one.
    async fn resolve(&self, payment: &Payment) -> Result<bool, SettlementError> {
        let provider = match self.gateway.inquire_by_order_id(&payment.order_id).await {
            Ok(provider) => provider,
            Err(err) if err.retryable() => {
                tracing::debug!(
                    order_id = %payment.order_id,
                    error = %err,
                    "provider unreachable, retrying next cycle"
                );
                return Ok(false);
            }
            Err(err) => {
                // A rejection on a read is not a state we know how to close.
                self.alerts
                    .notify(
                        Alert::critical("reconciliation inquiry rejected")
                            .field("order_id", &payment.order_id)
                            .field("payment_id", payment.id)
                            .field("error", &err),
                    )
                    .await;
                return Ok(false);
            }
        };

        match provider {
            None => {
                // The confirm never reached the provider. Nothing to refund.
                self.close_canceled(payment, RECONCILE_VOID_REASON).await?;
                Ok(true)
            }
            Some(remote) => match remote.status {
                ProviderStatus::Done => {
                    self.refund_unsettled(payment, &remote.provider_key).await
                }
                ProviderStatus::Canceled | ProviderStatus::Aborted => {
                    self.close_canceled(payment, RECONCILE_VOID_REASON).await?;
                    Ok(true)
                }
                // Still in flight provider-side; not ours to decide yet.
                ProviderStatus::Waiting | ProviderStatus::InProgress => Ok(false),
            },
        }
    }

    /// The provider holds money for an order we never settled. Mark the row
    /// CANCEL_REQUESTED first so a crash between refund and close leaves a
    /// trace, then refund and close.
    async fn refund_unsettled(
        &self,
        payment: &Payment,
        provider_key: &str,
    ) -> Result<bool, SettlementError> {
        if payment.status == PaymentStatus::Pending {
            self.store.mark_cancel_requested(payment.id).await?;
        }
        match self
            .gateway
            .cancel(provider_key, RECONCILE_REFUND_REASON)
            .await
        {
            Ok(_) => {}
            Err(err) if err.is_already_canceled() => {}
            Err(err) if err.retryable() => {
                // Row stays CANCEL_REQUESTED and is revisited next cycle.
                tracing::debug!(
                    order_id = %payment.order_id,
                    error = %err,
                    "reconciliation refund unavailable, retrying next cycle"
                );
                return Ok(false);
            }
            Err(err) => {
                self.alerts
                    .notify(
                        Alert::critical("reconciliation refund rejected")
                            .field("order_id", &payment.order_id)
                            .field("payment_id", payment.id)
                            .field("provider_key", provider_key)
                            .field("error", &err),
                    )
                    .await;
                return Ok(false);
            }
        }
        self.close_canceled(payment, RECONCILE_REFUND_REASON).await?;
        self.alerts
            .notify(
                Alert::info("stale payment refunded by reconciliation")
                    .field("order_id", &payment.order_id)
                    .field("payment_id", payment.id),
            )
            .await;
        Ok(true)
    }

    async fn close_canceled(
        &self,
        payment: &Payment,
        reason: &str,
    ) -> Result<(), SettlementError> {
        let event = DomainEvent::payment_canceled(
            payment.id,
            &payment.order_id,
            payment.wallet_id,
            payment.amount,
            reason,
        );
        self.store
            .mark_reconciled_canceled(payment.id, reason, &event)
            .await?;
        tracing::info!(
            order_id = %payment.order_id,
            payment_id = %payment.id,
            reason,
            "stale payment reconciled to CANCELED"
        );
        Ok(())
    }
}
