use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use wonpay_core::health::{healthz, readyz};
use wonpay_core::middleware::request_id_layer;

use crate::handlers::{
    metrics::metrics,
    payment::{cancel_payment, confirm_payment, get_payment, prepare_payment},
    wallet::{get_balance, grant_bonus},
};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        // Payments
        .route("/payments", post(prepare_payment))
        .route("/payments/confirm", post(confirm_payment))
        .route("/payments/{order_id}", get(get_payment))
        .route("/payments/{order_id}/cancel", post(cancel_payment))
        // Wallets
        .route("/wallets/{wallet_id}/bonus", post(grant_bonus))
        .route("/wallets/{wallet_id}/balance", get(get_balance))
        .layer(TraceLayer::new_for_http())
        .layer(request_id_layer())
        .with_state(state)
}
