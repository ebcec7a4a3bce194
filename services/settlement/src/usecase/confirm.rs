use chrono::Utc;

use wonpay_domain::event::DomainEvent;
use wonpay_domain::id::{OrderId, WalletId};
use wonpay_domain::money::Money;
use wonpay_domain::payment::PaymentStatus;

use crate::domain::gateway::{GatewayPayment, ProviderStatus};
use crate::domain::repository::{AlertNotifier, PaymentGateway, SettlementStore};
use crate::domain::types::{Alert, ConfirmCommit, ConfirmOutcome, Payment};
use crate::error::SettlementError;

const AUTO_CANCEL_REASON: &str = "auto-cancel: local settlement failed after provider confirm";

pub struct ConfirmPaymentInput {
    pub provider_key: String,
    pub order_id: OrderId,
    pub amount: i64,
    pub wallet_id: WalletId,
}

/// Confirm path of the settlement orchestrator.
///
/// The window between a successful provider confirm and the local commit is
/// the dangerous one: every exit from it either commits, auto-cancels the
/// provider side, or escalates with a critical alert. Nothing is dropped
/// silently.
pub struct ConfirmPaymentUseCase<S, G, A>
where
    S: SettlementStore,
    G: PaymentGateway,
    A: AlertNotifier,
{
    pub store: S,
    pub gateway: G,
    pub alerts: A,
}

impl<S, G, A> ConfirmPaymentUseCase<S, G, A>
where
    S: SettlementStore,
    G: PaymentGateway,
    A: AlertNotifier,
{
    pub async fn execute(
        &self,
        input: ConfirmPaymentInput,
    ) -> Result<ConfirmOutcome, SettlementError> {
        let amount = Money::charge_amount(input.amount).ok_or(SettlementError::InvalidAmount)?;

        let payment = self
            .store
            .find_by_order_id(&input.order_id)
            .await?
            .ok_or(SettlementError::PaymentNotFound)?;
        match payment.validate_for_confirmation(input.wallet_id, amount) {
            Ok(()) => {}
            // A replayed confirm of a settled order is a no-op, not an error.
            Err(SettlementError::AlreadyProcessed)
                if payment.status == PaymentStatus::Success =>
            {
                return Ok(ConfirmOutcome::AlreadyConfirmed);
            }
            Err(err) => return Err(err),
        }

        // No money has moved yet: a transient failure here propagates
        // untouched, there is nothing to compensate.
        let provider = self
            .gateway
            .confirm(&input.provider_key, &input.order_id, amount)
            .await?;

        // Provider-side money is committed from here on. Any local failure,
        // including a response we cannot interpret, must undo it.
        match self.settle(&payment, &input, provider).await {
            Ok(outcome) => {
                tracing::info!(
                    payment_id = %payment.id,
                    order_id = %payment.order_id,
                    already = matches!(outcome, ConfirmOutcome::AlreadyConfirmed),
                    "payment confirmed"
                );
                Ok(outcome)
            }
            Err(local_err) => {
                self.auto_cancel(&payment, &input.provider_key, &local_err)
                    .await;
                Err(local_err)
            }
        }
    }

    async fn settle(
        &self,
        payment: &Payment,
        input: &ConfirmPaymentInput,
        provider: GatewayPayment,
    ) -> Result<ConfirmOutcome, SettlementError> {
        // A 200 confirm body can still carry a non-settled status; committing
        // it as SUCCESS would credit money the provider never captured.
        if provider.status != ProviderStatus::Done {
            return Err(SettlementError::Internal(anyhow::anyhow!(
                "provider answered confirm for order {} with status {:?}",
                input.order_id,
                provider.status
            )));
        }
        let method = provider.method.ok_or_else(|| {
            SettlementError::Internal(anyhow::anyhow!(
                "provider confirmed order {} without a payment method",
                input.order_id
            ))
        })?;
        let paid_at = provider.approved_at.unwrap_or_else(Utc::now);

        let event = DomainEvent::payment_confirmed(
            payment.id,
            &payment.order_id,
            payment.wallet_id,
            payment.amount,
        );
        let commit = ConfirmCommit {
            provider_key: input.provider_key.clone(),
            method,
            paid_at,
            event,
        };
        self.store.commit_confirmation(&input.order_id, &commit).await
    }

    async fn auto_cancel(&self, payment: &Payment, provider_key: &str, original: &SettlementError) {
        match self.gateway.cancel(provider_key, AUTO_CANCEL_REASON).await {
            Ok(_) => self.record_auto_cancel(payment, original).await,
            Err(err) if err.is_already_canceled() => self.record_auto_cancel(payment, original).await,
            Err(cancel_err) => {
                // Funds are committed provider-side and unrecoverable
                // automatically: hand off to manual recovery.
                self.alerts
                    .notify(
                        Alert::critical("payment auto-cancel failed")
                            .field("order_id", &payment.order_id)
                            .field("payment_id", payment.id)
                            .field("provider_key", provider_key)
                            .field("original_error", original)
                            .field("cancel_error", &cancel_err),
                    )
                    .await;
            }
        }
    }

    async fn record_auto_cancel(&self, payment: &Payment, original: &SettlementError) {
        if let Err(mark_err) = self
            .store
            .mark_canceled_after_auto_cancel(
                &payment.order_id,
                AUTO_CANCEL_REASON,
                original.kind(),
                &original.to_string(),
            )
            .await
        {
            // Still PENDING locally; the reconciliation scheduler will
            // resolve it against the provider on its next pass.
            tracing::warn!(
                order_id = %payment.order_id,
                error = %mark_err,
                "auto-cancel local mark failed, leaving to reconciliation"
            );
        }
        self.alerts
            .notify(
                Alert::info("payment auto-canceled after local settlement failure")
                    .field("order_id", &payment.order_id)
                    .field("payment_id", payment.id)
                    .field("original_error", original),
            )
            .await;
    }
}
