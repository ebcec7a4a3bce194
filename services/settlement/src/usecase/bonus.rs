use wonpay_domain::event::DomainEvent;
use wonpay_domain::id::WalletId;
use wonpay_domain::money::Money;

use crate::domain::repository::SettlementStore;
use crate::domain::types::BonusOutcome;
use crate::error::SettlementError;

pub struct GrantBonusInput {
    pub wallet_id: WalletId,
    pub amount: i64,
    /// Caller-supplied grant identity, e.g. `signup-2026-08:{wallet_id}`.
    /// Identical keys credit at most once regardless of concurrency.
    pub grant_key: String,
}

pub struct GrantBonusUseCase<S>
where
    S: SettlementStore,
{
    pub store: S,
}

impl<S> GrantBonusUseCase<S>
where
    S: SettlementStore,
{
    pub async fn execute(&self, input: GrantBonusInput) -> Result<BonusOutcome, SettlementError> {
        let amount = Money::charge_amount(input.amount).ok_or(SettlementError::InvalidAmount)?;
        let event = DomainEvent::bonus_granted(input.wallet_id, amount, &input.grant_key);
        let outcome = self
            .store
            .grant_bonus(input.wallet_id, amount, &input.grant_key, &event)
            .await?;
        if matches!(outcome, BonusOutcome::Granted) {
            tracing::info!(
                wallet_id = %input.wallet_id,
                amount = %amount,
                grant_key = %input.grant_key,
                "bonus granted"
            );
        }
        Ok(outcome)
    }
}
