#![allow(async_fn_in_trait)]

use chrono::{DateTime, Utc};
use uuid::Uuid;

use wonpay_domain::event::DomainEvent;
use wonpay_domain::id::{OrderId, PaymentId, WalletId};
use wonpay_domain::money::Money;

use crate::domain::gateway::{GatewayError, GatewayPayment};
use crate::domain::types::{
    Alert, BonusOutcome, CancelCommit, CancelOutcome, CompensationOutcome, ConfirmCommit,
    ConfirmOutcome, OutboxRecord, Payment,
};
use crate::error::SettlementError;

/// Port for the external payment provider.
///
/// All three operations are provider-side idempotent: the idempotency key is
/// derived deterministically from order id / provider key, so repeated calls
/// for the same logical operation are deduplicated by the provider.
pub trait PaymentGateway: Send + Sync {
    async fn confirm(
        &self,
        provider_key: &str,
        order_id: &OrderId,
        amount: Money,
    ) -> Result<GatewayPayment, GatewayError>;

    async fn cancel(&self, provider_key: &str, reason: &str)
    -> Result<GatewayPayment, GatewayError>;

    /// Provider-side lookup by order id. `None` means the provider has no
    /// record of the order at all.
    async fn inquire_by_order_id(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<GatewayPayment>, GatewayError>;
}

/// Port over payments, wallet ledger and the outbox, as atomic commits.
///
/// Every mutating operation locks the payment row before inspecting state
/// and commits the payment transition, the wallet movement, the ledger
/// history entry and the outbox row in one local transaction.
/// `force_cancel_with_compensation` is the exception: it runs in its own
/// independent transaction regardless of the caller's, which is why it is a
/// separate method rather than a flag.
pub trait SettlementStore: Send + Sync {
    async fn create_payment(&self, payment: &Payment) -> Result<(), SettlementError>;

    async fn find_by_order_id(&self, order_id: &OrderId)
    -> Result<Option<Payment>, SettlementError>;

    /// Confirm commit: lock row, wallet credit, history, SUCCESS, outbox.
    /// A row already SUCCESS short-circuits to `AlreadyConfirmed` (the
    /// concurrent duplicate no-ops); any other non-PENDING status is
    /// `AlreadyProcessed`.
    async fn commit_confirmation(
        &self,
        order_id: &OrderId,
        commit: &ConfirmCommit,
    ) -> Result<ConfirmOutcome, SettlementError>;

    /// Bookkeeping after auto-cancel: the gateway refunded a charge whose
    /// local settlement failed, so no money moved locally. Records the
    /// failure code/message and marks the payment CANCELED.
    async fn mark_canceled_after_auto_cancel(
        &self,
        order_id: &OrderId,
        reason: &str,
        failure_code: &str,
        failure_message: &str,
    ) -> Result<(), SettlementError>;

    /// Cancel commit: lock row, short-circuit if already CANCELED, wallet
    /// debit, history, CANCELED, outbox.
    async fn commit_cancellation(
        &self,
        order_id: &OrderId,
        commit: &CancelCommit,
    ) -> Result<CancelOutcome, SettlementError>;

    /// Compensation entry point for the cancel saga: in an independent
    /// transaction, force the payment to CANCELED (ledger untouched,
    /// `compensation_completed` false) and persist the durable compensation
    /// event.
    async fn force_cancel_with_compensation(
        &self,
        payment_id: PaymentId,
        reason: &str,
        event: &DomainEvent,
    ) -> Result<(), SettlementError>;

    /// Consumer side of the compensation event: lock row, check the
    /// `compensation_completed` flag, wallet debit + history, set the flag.
    async fn apply_compensation(
        &self,
        payment_id: PaymentId,
    ) -> Result<CompensationOutcome, SettlementError>;

    /// Idempotency-keyed point credit; the ledger-history insert decides
    /// whether the grant is a duplicate.
    async fn grant_bonus(
        &self,
        wallet_id: WalletId,
        amount: Money,
        grant_key: &str,
        event: &DomainEvent,
    ) -> Result<BonusOutcome, SettlementError>;

    /// PENDING and CANCEL_REQUESTED payments older than `older_than`,
    /// oldest first.
    async fn find_stale_pending(
        &self,
        older_than: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<Payment>, SettlementError>;

    /// PENDING → CANCEL_REQUESTED before reconciliation issues the refund.
    async fn mark_cancel_requested(&self, payment_id: PaymentId) -> Result<(), SettlementError>;

    /// Terminal write of the reconciliation path. No ledger movement — the
    /// charge was never credited locally.
    async fn mark_reconciled_canceled(
        &self,
        payment_id: PaymentId,
        reason: &str,
        event: &DomainEvent,
    ) -> Result<(), SettlementError>;
}

/// Read-only ledger access for the cancel-path balance precheck.
pub trait LedgerReader: Send + Sync {
    async fn money_balance(&self, wallet_id: WalletId) -> Result<Money, SettlementError>;
}

/// Port over the outbox table for the publishers and the retention job.
pub trait OutboxStore: Send + Sync {
    /// Rows that need (re)publishing: SEND_FAIL, or INIT older than
    /// `stale_before`, with retry_count below `retry_cap`, oldest first.
    async fn find_publishable(
        &self,
        stale_before: DateTime<Utc>,
        retry_cap: i32,
        batch: u64,
    ) -> Result<Vec<OutboxRecord>, SettlementError>;

    /// Single compare-and-set: affects the row only if not already
    /// PUBLISHED. Returns whether this call won the transition.
    async fn mark_published(&self, event_id: Uuid) -> Result<bool, SettlementError>;

    /// Atomic retry_count increment + SEND_FAIL; never regresses PUBLISHED.
    async fn mark_send_failed(&self, event_id: Uuid, error: &str) -> Result<(), SettlementError>;

    /// Delete one batch of PUBLISHED rows older than `cutoff`; returns the
    /// number deleted so the retention job can stop on a short batch.
    async fn delete_published_before(
        &self,
        cutoff: DateTime<Utc>,
        batch: u64,
    ) -> Result<u64, SettlementError>;
}

/// Broker publish error vocabulary.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BrokerError {
    #[error("broker ack timed out")]
    AckTimeout,
    #[error("broker connection failed: {0}")]
    Connection(String),
    #[error("broker rejected message: {0}")]
    Rejected(String),
}

/// Port for publishing to the message broker with acknowledgment.
pub trait EventBroker: Send + Sync {
    /// Publish and await the broker ack under a bounded timeout. `event_id`
    /// doubles as the broker-side dedupe id.
    async fn publish(
        &self,
        subject: &str,
        event_id: Uuid,
        payload: &serde_json::Value,
    ) -> Result<(), BrokerError>;
}

/// Port for broker administrative queries (DLQ depths).
pub trait BrokerAdmin: Send + Sync {
    async fn dlq_depth(&self, queue: &str) -> Result<u64, BrokerError>;
}

/// Port for fire-and-forget operational alerts. Infallible by contract:
/// implementations log delivery failures, never escalate them into the
/// triggering flow.
pub trait AlertNotifier: Send + Sync {
    async fn notify(&self, alert: Alert);
}
