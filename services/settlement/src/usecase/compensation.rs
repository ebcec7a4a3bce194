use wonpay_domain::id::PaymentId;

use crate::domain::repository::SettlementStore;
use crate::domain::types::CompensationOutcome;
use crate::error::SettlementError;

/// Consumer side of the `payment.compensation_requested` event.
///
/// The store re-locks the payment and checks the `compensation_completed`
/// flag — status alone cannot tell "needs compensation" from "already
/// compensated", since the payment was already forced to CANCELED when the
/// event was enqueued.
pub struct CompensateCancellationUseCase<S>
where
    S: SettlementStore,
{
    pub store: S,
}

impl<S> CompensateCancellationUseCase<S>
where
    S: SettlementStore,
{
    pub async fn execute(
        &self,
        payment_id: PaymentId,
    ) -> Result<CompensationOutcome, SettlementError> {
        let outcome = self.store.apply_compensation(payment_id).await?;
        match outcome {
            CompensationOutcome::Applied => {
                tracing::info!(payment_id = %payment_id, "cancellation compensation applied");
            }
            CompensationOutcome::AlreadyCompensated => {
                tracing::debug!(payment_id = %payment_id, "compensation already applied, skipping");
            }
        }
        Ok(outcome)
    }
}
