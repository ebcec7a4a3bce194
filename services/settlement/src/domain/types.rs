use chrono::{DateTime, Utc};
use uuid::Uuid;

use wonpay_domain::event::DomainEvent;
use wonpay_domain::id::{OrderId, PaymentId, WalletId};
use wonpay_domain::money::Money;
use wonpay_domain::payment::{PaymentMethod, PaymentStatus};

use crate::error::SettlementError;

/// The payment aggregate.
///
/// Methods mutate in-memory state only; row locking and persistence are the
/// orchestrator's responsibility (see `SettlementStore`).
#[derive(Debug, Clone, PartialEq)]
pub struct Payment {
    pub id: PaymentId,
    pub wallet_id: WalletId,
    pub order_id: OrderId,
    pub amount: Money,
    pub status: PaymentStatus,
    pub provider_key: Option<String>,
    pub method: Option<PaymentMethod>,
    pub paid_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub failure_code: Option<String>,
    pub failure_message: Option<String>,
    pub compensation_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Create a PENDING payment with a fresh unique order id.
    pub fn prepare(
        wallet_id: WalletId,
        amount: i64,
        now: DateTime<Utc>,
    ) -> Result<Payment, SettlementError> {
        let amount = Money::charge_amount(amount).ok_or(SettlementError::InvalidAmount)?;
        Ok(Payment {
            id: PaymentId::generate(),
            wallet_id,
            order_id: OrderId::generate(now),
            amount,
            status: PaymentStatus::Pending,
            provider_key: None,
            method: None,
            paid_at: None,
            cancel_reason: None,
            failure_code: None,
            failure_message: None,
            compensation_completed: false,
            created_at: now,
            updated_at: now,
        })
    }

    /// PENDING → SUCCESS. Sets the provider key — the only transition that may.
    pub fn confirm(
        &mut self,
        provider_key: &str,
        method: PaymentMethod,
        paid_at: DateTime<Utc>,
    ) -> Result<(), SettlementError> {
        if self.status != PaymentStatus::Pending {
            return Err(SettlementError::AlreadyProcessed);
        }
        self.status = PaymentStatus::Success;
        self.provider_key = Some(provider_key.to_owned());
        self.method = Some(method);
        self.paid_at = Some(paid_at);
        self.updated_at = paid_at;
        Ok(())
    }

    /// PENDING or SUCCESS → CANCELED.
    pub fn cancel(&mut self, reason: &str, now: DateTime<Utc>) -> Result<(), SettlementError> {
        match self.status {
            PaymentStatus::Pending | PaymentStatus::Success => {
                self.status = PaymentStatus::Canceled;
                self.cancel_reason = Some(reason.to_owned());
                self.updated_at = now;
                Ok(())
            }
            _ => Err(SettlementError::NotCancellable),
        }
    }

    /// CANCEL_REQUESTED → CANCELED (reconciliation resolved the provider side).
    pub fn complete_requested_cancel(
        &mut self,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), SettlementError> {
        if self.status != PaymentStatus::CancelRequested {
            return Err(SettlementError::NotCancellable);
        }
        self.status = PaymentStatus::Canceled;
        self.cancel_reason = Some(reason.to_owned());
        self.updated_at = now;
        Ok(())
    }

    pub fn validate_for_confirmation(
        &self,
        wallet_id: WalletId,
        amount: Money,
    ) -> Result<(), SettlementError> {
        if self.wallet_id != wallet_id {
            return Err(SettlementError::OwnershipMismatch);
        }
        if self.amount != amount {
            return Err(SettlementError::AmountMismatch);
        }
        if self.status != PaymentStatus::Pending {
            return Err(SettlementError::AlreadyProcessed);
        }
        Ok(())
    }

    pub fn validate_for_cancellation(
        &self,
        wallet_id: WalletId,
        now: DateTime<Utc>,
    ) -> Result<(), SettlementError> {
        if self.wallet_id != wallet_id {
            return Err(SettlementError::OwnershipMismatch);
        }
        if self.status != PaymentStatus::Success {
            return Err(SettlementError::NotCancellable);
        }
        let (method, paid_at) = match (self.method, self.paid_at) {
            (Some(method), Some(paid_at)) => (method, paid_at),
            // SUCCESS always carries both; a row without them is corrupt.
            _ => {
                return Err(SettlementError::Internal(anyhow::anyhow!(
                    "SUCCESS payment {} without method or paid_at",
                    self.id
                )));
            }
        };
        if !method.cancellable_at(paid_at, now) {
            return Err(SettlementError::PeriodExpired);
        }
        Ok(())
    }
}

/// Ledger-history idempotency keys: (operation category, source id, asset).
pub fn confirm_history_key(payment_id: PaymentId) -> String {
    format!("payment_confirm:{payment_id}:money")
}

pub fn cancel_history_key(payment_id: PaymentId) -> String {
    format!("payment_cancel:{payment_id}:money")
}

pub fn bonus_history_key(grant_key: &str) -> String {
    format!("bonus_grant:{grant_key}:point")
}

/// Data committed alongside the SUCCESS transition, in one local transaction.
#[derive(Debug, Clone)]
pub struct ConfirmCommit {
    pub provider_key: String,
    pub method: PaymentMethod,
    pub paid_at: DateTime<Utc>,
    pub event: DomainEvent,
}

/// Data committed alongside the CANCELED transition.
#[derive(Debug, Clone)]
pub struct CancelCommit {
    pub reason: String,
    pub event: DomainEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Applied,
    /// A concurrent attempt already confirmed this payment; nothing was done.
    AlreadyConfirmed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Applied,
    AlreadyCanceled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompensationOutcome {
    Applied,
    AlreadyCompensated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BonusOutcome {
    Granted,
    AlreadyGranted,
}

/// Outbox row as seen by the publishers.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxRecord {
    pub id: Uuid,
    pub event_id: Uuid,
    pub event_type: String,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub payload: serde_json::Value,
    pub status: OutboxStatus,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
}

impl OutboxRecord {
    pub fn subject(&self) -> String {
        format!("{}.{}", self.aggregate_type, self.event_type)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboxStatus {
    Init,
    SendFail,
    Published,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::SendFail => "SEND_FAIL",
            Self::Published => "PUBLISHED",
        }
    }
}

/// Fire-and-forget operational alert.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub severity: AlertSeverity,
    pub title: String,
    pub fields: Vec<(String, String)>,
}

impl Alert {
    pub fn info(title: &str) -> Self {
        Self {
            severity: AlertSeverity::Info,
            title: title.to_owned(),
            fields: Vec::new(),
        }
    }

    pub fn critical(title: &str) -> Self {
        Self {
            severity: AlertSeverity::Critical,
            title: title.to_owned(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, key: &str, value: impl ToString) -> Self {
        self.fields.push((key.to_owned(), value.to_string()));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertSeverity {
    Info,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Critical => "CRITICAL",
        }
    }
}
