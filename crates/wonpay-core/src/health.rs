use axum::http::StatusCode;

/// Handler for `GET /healthz`, the liveness check.
pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// Handler for `GET /readyz`. Services needing a real readiness probe
/// register their own handler instead.
pub async fn readyz() -> StatusCode {
    StatusCode::OK
}
