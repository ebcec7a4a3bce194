//! Payment-provider error taxonomy and the retry executor shared by every
//! gateway call.

use std::time::Duration;

use chrono::{DateTime, Utc};

use wonpay_domain::payment::PaymentMethod;

use crate::error::SettlementError;

/// Provider-side view of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderStatus {
    Done,
    Canceled,
    Aborted,
    Waiting,
    InProgress,
}

/// The provider's response body for confirm/cancel, normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayPayment {
    pub provider_key: String,
    pub status: ProviderStatus,
    pub method: Option<PaymentMethod>,
    pub approved_at: Option<DateTime<Utc>>,
}

/// Closed error vocabulary for the provider boundary.
///
/// `Rejected` never retries; `Transient` survives retry exhaustion as this
/// same distinguishable type so callers do not mistake it for a terminal
/// failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    #[error("provider rejected {code}: {message}")]
    Rejected { code: String, message: String },
    #[error("provider transient failure: {0}")]
    Transient(String),
}

impl GatewayError {
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// A cancel attempt answered "already canceled" is a success for every
    /// caller (auto-cancel, reconciliation): the provider-side money is back.
    pub fn is_already_canceled(&self) -> bool {
        matches!(self, Self::Rejected { code, .. } if code == "ALREADY_CANCELED_PAYMENT")
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Rejected { code, .. } if code == "NOT_FOUND_PAYMENT")
    }
}

impl From<GatewayError> for SettlementError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Rejected { code, message } => {
                SettlementError::GatewayRejected { code, message }
            }
            GatewayError::Transient(message) => SettlementError::GatewayUnavailable(message),
        }
    }
}

/// Map a provider error code to the closed vocabulary.
///
/// Card, balance and key-format problems are final rejections. Provider
/// outages and anything unknown are transient: an unknown code must never be
/// treated as a definitive outcome.
pub fn classify_provider_code(code: &str, message: &str) -> GatewayError {
    match code {
        "INVALID_CARD_NUMBER"
        | "INVALID_CARD_EXPIRATION"
        | "REJECT_CARD_COMPANY"
        | "EXCEED_MAX_DAILY_PAYMENT_COUNT"
        | "NOT_ENOUGH_BALANCE"
        | "INVALID_PAYMENT_KEY"
        | "INVALID_ORDER_ID"
        | "NOT_FOUND_PAYMENT"
        | "ALREADY_CANCELED_PAYMENT" => GatewayError::Rejected {
            code: code.to_owned(),
            message: message.to_owned(),
        },
        "PROVIDER_ERROR" | "FAILED_INTERNAL_SYSTEM_PROCESSING" | "UNKNOWN_PAYMENT_ERROR" => {
            GatewayError::Transient(format!("{code}: {message}"))
        }
        _ => GatewayError::Transient(format!("unrecognized code {code}: {message}")),
    }
}

/// Explicit retry-executor: policy is data, not framework magic.
///
/// Retries only provider-classified transient errors, with bounded attempts
/// and exponential backoff. All three gateway operations share one policy.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, GatewayError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let mut delay = self.initial_delay;
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.retryable() && attempt < self.max_attempts => {
                    tracing::debug!(attempt, error = %err, "retrying transient gateway failure");
                    tokio::time::sleep(delay).await;
                    delay = delay.mul_f64(self.multiplier);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
