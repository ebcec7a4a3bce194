use chrono::Utc;

use wonpay_domain::event::DomainEvent;
use wonpay_domain::id::{OrderId, WalletId};
use wonpay_domain::payment::PaymentStatus;

use crate::domain::repository::{AlertNotifier, LedgerReader, PaymentGateway, SettlementStore};
use crate::domain::types::{Alert, CancelCommit, CancelOutcome, Payment};
use crate::error::SettlementError;

pub struct CancelPaymentInput {
    pub order_id: OrderId,
    pub wallet_id: WalletId,
    pub reason: String,
}

/// Cancel path of the settlement orchestrator, including the compensation
/// saga for the window where the provider refund is already irreversible but
/// the local write fails.
pub struct CancelPaymentUseCase<S, L, G, A>
where
    S: SettlementStore,
    L: LedgerReader,
    G: PaymentGateway,
    A: AlertNotifier,
{
    pub store: S,
    pub ledger: L,
    pub gateway: G,
    pub alerts: A,
}

impl<S, L, G, A> CancelPaymentUseCase<S, L, G, A>
where
    S: SettlementStore,
    L: LedgerReader,
    G: PaymentGateway,
    A: AlertNotifier,
{
    pub async fn execute(
        &self,
        input: CancelPaymentInput,
    ) -> Result<CancelOutcome, SettlementError> {
        let payment = self
            .store
            .find_by_order_id(&input.order_id)
            .await?
            .ok_or(SettlementError::PaymentNotFound)?;

        if payment.status == PaymentStatus::Canceled {
            // A replayed cancel of a refunded order is a no-op, not an error.
            if payment.wallet_id != input.wallet_id {
                return Err(SettlementError::OwnershipMismatch);
            }
            return Ok(CancelOutcome::AlreadyCanceled);
        }
        payment.validate_for_cancellation(input.wallet_id, Utc::now())?;

        // The credited money must still be in the wallet; once spent
        // elsewhere the refund cannot be taken back.
        let balance = self.ledger.money_balance(payment.wallet_id).await?;
        if balance < payment.amount {
            return Err(SettlementError::AlreadyUsedCannotCancel);
        }
        let provider_key = payment.provider_key.clone().ok_or_else(|| {
            SettlementError::Internal(anyhow::anyhow!(
                "SUCCESS payment {} without provider key",
                payment.id
            ))
        })?;

        // External call outside any DB transaction: it must never hold a lock.
        match self.gateway.cancel(&provider_key, &input.reason).await {
            Ok(_) => {}
            // Refunded by an earlier attempt; the local commit below decides
            // whether anything remains to be written.
            Err(err) if err.is_already_canceled() => {}
            Err(err) => return Err(err.into()),
        }

        let event = DomainEvent::payment_canceled(
            payment.id,
            &payment.order_id,
            payment.wallet_id,
            payment.amount,
            &input.reason,
        );
        let commit = CancelCommit {
            reason: input.reason.clone(),
            event,
        };

        match self.store.commit_cancellation(&input.order_id, &commit).await {
            Ok(outcome) => {
                tracing::info!(
                    payment_id = %payment.id,
                    order_id = %payment.order_id,
                    already = matches!(outcome, CancelOutcome::AlreadyCanceled),
                    "payment canceled"
                );
                Ok(outcome)
            }
            Err(local_err) => {
                // The provider side is already refunded and cannot be redone.
                self.compensate(&payment, &input.reason, &local_err).await;
                Err(local_err)
            }
        }
    }

    async fn compensate(&self, payment: &Payment, reason: &str, local_err: &SettlementError) {
        let comp_event = DomainEvent::compensation_requested(
            payment.id,
            payment.wallet_id,
            payment.amount,
            &local_err.to_string(),
        );
        match self
            .store
            .force_cancel_with_compensation(payment.id, reason, &comp_event)
            .await
        {
            Ok(()) => {
                tracing::warn!(
                    payment_id = %payment.id,
                    error = %local_err,
                    "cancel settlement failed, compensation event enqueued"
                );
            }
            Err(comp_err) => {
                self.alerts
                    .notify(
                        Alert::critical("cancel compensation failed")
                            .field("payment_id", payment.id)
                            .field("order_id", &payment.order_id)
                            .field("original_error", local_err)
                            .field("compensation_error", &comp_err),
                    )
                    .await;
            }
        }
    }
}
