//! Domain event envelope carried through the transactional outbox.

use serde_json::json;
use uuid::Uuid;

use crate::id::{OrderId, PaymentId, WalletId};
use crate::money::Money;

pub const AGGREGATE_PAYMENT: &str = "payment";
pub const AGGREGATE_WALLET: &str = "wallet";

pub const EVENT_PAYMENT_CONFIRMED: &str = "confirmed";
pub const EVENT_PAYMENT_CANCELED: &str = "canceled";
pub const EVENT_COMPENSATION_REQUESTED: &str = "compensation_requested";
pub const EVENT_BONUS_GRANTED: &str = "bonus_granted";

/// An event destined for downstream subsystems, committed in the same
/// transaction as the state change it announces.
///
/// `event_id` is unique across all events and is the producer-side dedupe
/// key; consumers must treat a repeated `event_id` as already handled.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainEvent {
    pub event_id: Uuid,
    /// Sub-route within the aggregate's exchange (e.g. "confirmed").
    pub event_type: String,
    /// Selects the destination exchange (e.g. "payment").
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub payload: serde_json::Value,
}

impl DomainEvent {
    fn new(
        aggregate_type: &str,
        event_type: &str,
        aggregate_id: String,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type: event_type.to_owned(),
            aggregate_type: aggregate_type.to_owned(),
            aggregate_id,
            payload,
        }
    }

    /// Broker subject: `{aggregate_type}.{event_type}`.
    pub fn subject(&self) -> String {
        format!("{}.{}", self.aggregate_type, self.event_type)
    }

    pub fn payment_confirmed(
        payment_id: PaymentId,
        order_id: &OrderId,
        wallet_id: WalletId,
        amount: Money,
    ) -> Self {
        Self::new(
            AGGREGATE_PAYMENT,
            EVENT_PAYMENT_CONFIRMED,
            payment_id.to_string(),
            json!({
                "payment_id": payment_id,
                "order_id": order_id,
                "wallet_id": wallet_id,
                "amount": amount,
            }),
        )
    }

    pub fn payment_canceled(
        payment_id: PaymentId,
        order_id: &OrderId,
        wallet_id: WalletId,
        amount: Money,
        reason: &str,
    ) -> Self {
        Self::new(
            AGGREGATE_PAYMENT,
            EVENT_PAYMENT_CANCELED,
            payment_id.to_string(),
            json!({
                "payment_id": payment_id,
                "order_id": order_id,
                "wallet_id": wallet_id,
                "amount": amount,
                "reason": reason,
            }),
        )
    }

    /// Emitted when the cancel saga could not complete its local write and a
    /// durable compensation pass must finish the ledger side.
    pub fn compensation_requested(
        payment_id: PaymentId,
        wallet_id: WalletId,
        amount: Money,
        original_error: &str,
    ) -> Self {
        Self::new(
            AGGREGATE_PAYMENT,
            EVENT_COMPENSATION_REQUESTED,
            payment_id.to_string(),
            json!({
                "payment_id": payment_id,
                "wallet_id": wallet_id,
                "amount": amount,
                "original_error": original_error,
            }),
        )
    }

    pub fn bonus_granted(wallet_id: WalletId, amount: Money, grant_key: &str) -> Self {
        Self::new(
            AGGREGATE_WALLET,
            EVENT_BONUS_GRANTED,
            wallet_id.to_string(),
            json!({
                "wallet_id": wallet_id,
                "amount": amount,
                "grant_key": grant_key,
            }),
        )
    }
}
