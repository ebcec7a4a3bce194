use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use wonpay_core::serde::{to_rfc3339_ms, to_rfc3339_ms_opt};
use wonpay_domain::id::{OrderId, WalletId};
use wonpay_domain::money::Money;

use crate::domain::repository::SettlementStore;
use crate::domain::types::{CancelOutcome, ConfirmOutcome, Payment};
use crate::error::SettlementError;
use crate::state::AppState;
use crate::usecase::cancel::{CancelPaymentInput, CancelPaymentUseCase};
use crate::usecase::confirm::{ConfirmPaymentInput, ConfirmPaymentUseCase};
use crate::usecase::prepare::{PreparePaymentInput, PreparePaymentUseCase};

#[derive(Serialize)]
pub struct PaymentResponse {
    pub payment_id: uuid::Uuid,
    pub wallet_id: uuid::Uuid,
    pub order_id: String,
    pub amount: Money,
    pub status: String,
    pub method: Option<String>,
    #[serde(serialize_with = "to_rfc3339_ms_opt")]
    pub paid_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    #[serde(serialize_with = "to_rfc3339_ms")]
    pub created_at: DateTime<Utc>,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        Self {
            payment_id: payment.id.0,
            wallet_id: payment.wallet_id.0,
            order_id: payment.order_id.to_string(),
            amount: payment.amount,
            status: payment.status.as_str().to_owned(),
            method: payment.method.map(|m| m.as_str().to_owned()),
            paid_at: payment.paid_at,
            cancel_reason: payment.cancel_reason,
            created_at: payment.created_at,
        }
    }
}

// ── POST /payments ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct PreparePaymentRequest {
    pub wallet_id: WalletId,
    pub amount: i64,
}

pub async fn prepare_payment(
    State(state): State<AppState>,
    Json(body): Json<PreparePaymentRequest>,
) -> Result<impl IntoResponse, SettlementError> {
    let usecase = PreparePaymentUseCase {
        store: state.settlement_store(),
    };
    let payment = usecase
        .execute(PreparePaymentInput {
            wallet_id: body.wallet_id,
            amount: body.amount,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(PaymentResponse::from(payment))))
}

// ── POST /payments/confirm ────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ConfirmPaymentRequest {
    pub provider_key: String,
    pub order_id: OrderId,
    pub amount: i64,
    pub wallet_id: WalletId,
}

pub async fn confirm_payment(
    State(state): State<AppState>,
    Json(body): Json<ConfirmPaymentRequest>,
) -> Result<impl IntoResponse, SettlementError> {
    let usecase = ConfirmPaymentUseCase {
        store: state.settlement_store(),
        gateway: state.gateway.clone(),
        alerts: state.alerts.clone(),
    };
    let order_id = body.order_id.clone();
    let outcome = usecase
        .execute(ConfirmPaymentInput {
            provider_key: body.provider_key,
            order_id: body.order_id,
            amount: body.amount,
            wallet_id: body.wallet_id,
        })
        .await?;
    state.outbox_wakeup.notify_one();

    let payment = state
        .settlement_store()
        .find_by_order_id(&order_id)
        .await?
        .ok_or(SettlementError::PaymentNotFound)?;
    let status = match outcome {
        ConfirmOutcome::Applied => StatusCode::CREATED,
        ConfirmOutcome::AlreadyConfirmed => StatusCode::OK,
    };
    Ok((status, Json(PaymentResponse::from(payment))))
}

// ── POST /payments/{order_id}/cancel ──────────────────────────────────────────

#[derive(Deserialize)]
pub struct CancelPaymentRequest {
    pub wallet_id: WalletId,
    pub reason: String,
}

pub async fn cancel_payment(
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
    Json(body): Json<CancelPaymentRequest>,
) -> Result<impl IntoResponse, SettlementError> {
    let usecase = CancelPaymentUseCase {
        store: state.settlement_store(),
        ledger: state.ledger_reader(),
        gateway: state.gateway.clone(),
        alerts: state.alerts.clone(),
    };
    let outcome = usecase
        .execute(CancelPaymentInput {
            order_id: order_id.clone(),
            wallet_id: body.wallet_id,
            reason: body.reason,
        })
        .await?;
    state.outbox_wakeup.notify_one();

    let payment = state
        .settlement_store()
        .find_by_order_id(&order_id)
        .await?
        .ok_or(SettlementError::PaymentNotFound)?;
    let status = match outcome {
        CancelOutcome::Applied => StatusCode::CREATED,
        CancelOutcome::AlreadyCanceled => StatusCode::OK,
    };
    Ok((status, Json(PaymentResponse::from(payment))))
}

// ── GET /payments/{order_id} ──────────────────────────────────────────────────

pub async fn get_payment(
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
) -> Result<impl IntoResponse, SettlementError> {
    let payment = state
        .settlement_store()
        .find_by_order_id(&order_id)
        .await?
        .ok_or(SettlementError::PaymentNotFound)?;
    Ok(Json(PaymentResponse::from(payment)))
}
