use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Settlement service domain error variants.
///
/// Validation and terminal business errors are rejected synchronously with a
/// specific kind; transient gateway failures surface as GATEWAY_UNAVAILABLE
/// after retry exhaustion; catastrophic partial failures reach the caller as
/// a generic INTERNAL while compensation and alerting run behind the scenes.
#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    #[error("amount must be positive")]
    InvalidAmount,
    #[error("payment not found")]
    PaymentNotFound,
    #[error("payment belongs to another wallet")]
    OwnershipMismatch,
    #[error("amount does not match the prepared payment")]
    AmountMismatch,
    #[error("payment already processed")]
    AlreadyProcessed,
    #[error("payment is not cancellable")]
    NotCancellable,
    #[error("cancellation window for this payment method has expired")]
    PeriodExpired,
    #[error("balance already spent, cancellation unavailable")]
    AlreadyUsedCannotCancel,
    #[error("insufficient balance")]
    InsufficientBalance,
    #[error("payment provider rejected {code}: {message}")]
    GatewayRejected { code: String, message: String },
    #[error("payment provider unavailable: {0}")]
    GatewayUnavailable(String),
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl SettlementError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidAmount => "INVALID_AMOUNT",
            Self::PaymentNotFound => "PAYMENT_NOT_FOUND",
            Self::OwnershipMismatch => "OWNERSHIP_MISMATCH",
            Self::AmountMismatch => "AMOUNT_MISMATCH",
            Self::AlreadyProcessed => "ALREADY_PROCESSED",
            Self::NotCancellable => "NOT_CANCELLABLE",
            Self::PeriodExpired => "PERIOD_EXPIRED",
            Self::AlreadyUsedCannotCancel => "ALREADY_USED_CANNOT_CANCEL",
            Self::InsufficientBalance => "INSUFFICIENT_BALANCE",
            Self::GatewayRejected { .. } => "GATEWAY_REJECTED",
            Self::GatewayUnavailable(_) => "GATEWAY_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

impl From<sea_orm::DbErr> for SettlementError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Internal(anyhow::Error::new(err))
    }
}

impl IntoResponse for SettlementError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidAmount | Self::AmountMismatch => StatusCode::BAD_REQUEST,
            Self::PaymentNotFound => StatusCode::NOT_FOUND,
            Self::OwnershipMismatch => StatusCode::FORBIDDEN,
            Self::AlreadyProcessed
            | Self::NotCancellable
            | Self::PeriodExpired
            | Self::AlreadyUsedCannotCancel
            | Self::InsufficientBalance => StatusCode::CONFLICT,
            Self::GatewayRejected { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::GatewayUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // The anyhow chain is only visible here; 4xx statuses are already
        // covered by the request trace layer.
        if let Self::Internal(ref e) = self {
            tracing::error!(error = %e, kind = "INTERNAL", "internal error");
        }
        let body = serde_json::json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        (status, axum::Json(body)).into_response()
    }
}
