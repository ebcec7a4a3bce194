use axum::{extract::State, http::StatusCode, response::IntoResponse};
use prometheus::{Encoder as _, TextEncoder};

use crate::state::AppState;

// ── GET /metrics ──────────────────────────────────────────────────────────────

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let families = state.registry.gather();
    let mut buf = Vec::new();
    if let Err(err) = TextEncoder::new().encode(&families, &mut buf) {
        tracing::warn!(error = %err, "metrics encoding failed");
        return (StatusCode::INTERNAL_SERVER_ERROR, String::new()).into_response();
    }
    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        buf,
    )
        .into_response()
}
