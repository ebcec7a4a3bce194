use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};

use wonpay_domain::id::WalletId;
use wonpay_domain::money::Money;

use crate::domain::repository::LedgerReader;
use crate::domain::types::BonusOutcome;
use crate::error::SettlementError;
use crate::state::AppState;
use crate::usecase::bonus::{GrantBonusInput, GrantBonusUseCase};

// ── POST /wallets/{wallet_id}/bonus ───────────────────────────────────────────

#[derive(Deserialize)]
pub struct GrantBonusRequest {
    pub amount: i64,
    pub grant_key: String,
}

#[derive(Serialize)]
pub struct GrantBonusResponse {
    pub wallet_id: WalletId,
    pub amount: Money,
    pub granted: bool,
}

pub async fn grant_bonus(
    State(state): State<AppState>,
    Path(wallet_id): Path<WalletId>,
    Json(body): Json<GrantBonusRequest>,
) -> Result<impl IntoResponse, SettlementError> {
    let usecase = GrantBonusUseCase {
        store: state.settlement_store(),
    };
    let amount = body.amount;
    let outcome = usecase
        .execute(GrantBonusInput {
            wallet_id,
            amount,
            grant_key: body.grant_key,
        })
        .await?;
    state.outbox_wakeup.notify_one();

    let (status, granted) = match outcome {
        BonusOutcome::Granted => (StatusCode::CREATED, true),
        BonusOutcome::AlreadyGranted => (StatusCode::OK, false),
    };
    Ok((
        status,
        Json(GrantBonusResponse {
            wallet_id,
            amount: Money(amount),
            granted,
        }),
    ))
}

// ── GET /wallets/{wallet_id}/balance ──────────────────────────────────────────

#[derive(Serialize)]
pub struct WalletBalanceResponse {
    pub wallet_id: WalletId,
    pub money_balance: Money,
}

pub async fn get_balance(
    State(state): State<AppState>,
    Path(wallet_id): Path<WalletId>,
) -> Result<impl IntoResponse, SettlementError> {
    let money_balance = state.ledger_reader().money_balance(wallet_id).await?;
    Ok(Json(WalletBalanceResponse {
        wallet_id,
        money_balance,
    }))
}
