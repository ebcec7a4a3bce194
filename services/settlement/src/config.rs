/// Settlement service configuration loaded from environment variables.
#[derive(Debug)]
pub struct SettlementConfig {
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// NATS server URL (e.g. "nats://nats:4222").
    pub nats_url: String,
    /// Payment provider API base URL.
    pub gateway_base_url: String,
    /// Merchant secret key for provider basic auth.
    pub gateway_secret_key: String,
    /// Provider HTTP timeout in milliseconds (default 5000).
    pub gateway_timeout_ms: u64,
    /// Operations webhook for alerts; alerts go to the log only when unset.
    pub alert_webhook_url: Option<String>,
    /// TCP port to listen on (default 3140). Env var: `SETTLEMENT_PORT`.
    pub settlement_port: u16,
    /// Outbox relay poll interval in seconds (default 10).
    pub outbox_poll_secs: u64,
    /// Age before an INIT outbox row counts as missed by its wakeup (default 30s).
    pub outbox_stale_secs: i64,
    /// Publish attempts per outbox row before operators take over (default 10).
    pub outbox_retry_cap: i32,
    /// Rows per outbox sweep (default 100).
    pub outbox_batch: u64,
    /// Broker ack timeout in milliseconds (default 2000).
    pub broker_ack_timeout_ms: u64,
    /// Days a PUBLISHED outbox row is kept before retention deletes it (default 7).
    pub outbox_keep_days: i64,
    /// Age before a PENDING payment is reconciled, in seconds (default 600).
    pub reconcile_stale_secs: i64,
    /// Reconciliation cycle interval in seconds (default 300).
    pub reconcile_interval_secs: u64,
    /// DLQ monitor cycle interval in seconds (default 60).
    pub dlq_interval_secs: u64,
}

impl SettlementConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL").expect("DATABASE_URL"),
            nats_url: std::env::var("NATS_URL").expect("NATS_URL"),
            gateway_base_url: std::env::var("GATEWAY_BASE_URL").expect("GATEWAY_BASE_URL"),
            gateway_secret_key: std::env::var("GATEWAY_SECRET_KEY").expect("GATEWAY_SECRET_KEY"),
            gateway_timeout_ms: env_or("GATEWAY_TIMEOUT_MS", 5000),
            alert_webhook_url: std::env::var("ALERT_WEBHOOK_URL").ok(),
            settlement_port: env_or("SETTLEMENT_PORT", 3140),
            outbox_poll_secs: env_or("OUTBOX_POLL_SECS", 10),
            outbox_stale_secs: env_or("OUTBOX_STALE_SECS", 30),
            outbox_retry_cap: env_or("OUTBOX_RETRY_CAP", 10),
            outbox_batch: env_or("OUTBOX_BATCH", 100),
            broker_ack_timeout_ms: env_or("BROKER_ACK_TIMEOUT_MS", 2000),
            outbox_keep_days: env_or("OUTBOX_KEEP_DAYS", 7),
            reconcile_stale_secs: env_or("RECONCILE_STALE_SECS", 600),
            reconcile_interval_secs: env_or("RECONCILE_INTERVAL_SECS", 300),
            dlq_interval_secs: env_or("DLQ_INTERVAL_SECS", 60),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
