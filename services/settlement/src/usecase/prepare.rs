use chrono::Utc;

use wonpay_domain::id::WalletId;

use crate::domain::repository::SettlementStore;
use crate::domain::types::Payment;
use crate::error::SettlementError;

pub struct PreparePaymentInput {
    pub wallet_id: WalletId,
    pub amount: i64,
}

pub struct PreparePaymentUseCase<S>
where
    S: SettlementStore,
{
    pub store: S,
}

impl<S> PreparePaymentUseCase<S>
where
    S: SettlementStore,
{
    pub async fn execute(&self, input: PreparePaymentInput) -> Result<Payment, SettlementError> {
        let payment = Payment::prepare(input.wallet_id, input.amount, Utc::now())?;
        self.store.create_payment(&payment).await?;
        tracing::info!(
            payment_id = %payment.id,
            order_id = %payment.order_id,
            amount = %payment.amount,
            "payment prepared"
        );
        Ok(payment)
    }
}
