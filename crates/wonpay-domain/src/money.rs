//! Monetary amounts in minor currency units (KRW has no fractional unit).

use std::fmt;

use serde::{Deserialize, Serialize};

/// A monetary amount in minor currency units.
///
/// Arithmetic is checked; a wallet balance must never go negative and a
/// charge amount must never overflow from repeated bonus credits.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Money(pub i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// A charge or refund amount. Zero and negative amounts are rejected.
    pub fn charge_amount(raw: i64) -> Option<Money> {
        (raw > 0).then_some(Money(raw))
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Subtraction that refuses to go below zero (wallet balance invariant).
    pub fn checked_sub(self, other: Money) -> Option<Money> {
        let rest = self.0.checked_sub(other.0)?;
        (rest >= 0).then_some(Money(rest))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Money> for i64 {
    fn from(money: Money) -> i64 {
        money.0
    }
}
