//! Payment status and method vocabulary.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a payment.
///
/// ```text
/// PENDING ──► SUCCESS ──► CANCELED
///    │                       ▲
///    ├───────────────────────┤   (pre-confirm failure)
///    └──► CANCEL_REQUESTED ──┘   (reconciliation path)
/// ```
///
/// CANCELED is terminal. Rows are never deleted; the status history is the
/// audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Success,
    CancelRequested,
    Canceled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Success => "SUCCESS",
            Self::CancelRequested => "CANCEL_REQUESTED",
            Self::Canceled => "CANCELED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "SUCCESS" => Ok(Self::Success),
            "CANCEL_REQUESTED" => Ok(Self::CancelRequested),
            "CANCELED" => Ok(Self::Canceled),
            other => Err(UnknownVariant(other.to_owned())),
        }
    }
}

/// How the payment was made at the provider side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Card,
    EasyPay,
    MobileCarrier,
    GiftCertificate,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Card => "CARD",
            Self::EasyPay => "EASY_PAY",
            Self::MobileCarrier => "MOBILE_CARRIER",
            Self::GiftCertificate => "GIFT_CERTIFICATE",
        }
    }

    /// Whether a confirmed payment paid at `paid_at` may still be canceled
    /// at `now`.
    ///
    /// Card, easy-pay and carrier billing settle with the provider once per
    /// calendar month; after the month closes a refund has to go through
    /// manual operations. Gift certificates are consumed on confirmation and
    /// can never be refunded through the provider.
    pub fn cancellable_at(&self, paid_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self {
            Self::GiftCertificate => false,
            Self::Card | Self::EasyPay | Self::MobileCarrier => {
                paid_at.year() == now.year() && paid_at.month() == now.month()
            }
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CARD" => Ok(Self::Card),
            "EASY_PAY" => Ok(Self::EasyPay),
            "MOBILE_CARRIER" => Ok(Self::MobileCarrier),
            "GIFT_CERTIFICATE" => Ok(Self::GiftCertificate),
            other => Err(UnknownVariant(other.to_owned())),
        }
    }
}

/// A string from the database or a provider response that does not map to a
/// known enum variant.
#[derive(Debug, thiserror::Error)]
#[error("unknown variant: {0}")]
pub struct UnknownVariant(pub String);
