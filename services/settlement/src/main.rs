use std::sync::Arc;
use std::time::Duration;

use prometheus::Registry;
use sea_orm::Database;
use tokio::sync::{Notify, watch};
use tracing::info;

use wonpay_core::tracing::init_tracing;
use wonpay_domain::event::{AGGREGATE_PAYMENT, AGGREGATE_WALLET};
use wonpay_settlement::config::SettlementConfig;
use wonpay_settlement::domain::gateway::RetryPolicy;
use wonpay_settlement::infra::alert::WebhookAlertNotifier;
use wonpay_settlement::infra::broker::NatsEventBroker;
use wonpay_settlement::infra::gateway::HttpPaymentGateway;
use wonpay_settlement::router::build_router;
use wonpay_settlement::state::AppState;
use wonpay_settlement::worker::compensator::CompensationConsumer;
use wonpay_settlement::worker::dlq_monitor::DlqMonitor;
use wonpay_settlement::worker::outbox::{OutboxRelay, RelayConfig};
use wonpay_settlement::worker::reconcile::ReconcileWorker;
use wonpay_settlement::worker::retention::OutboxRetention;

#[tokio::main]
async fn main() {
    init_tracing();

    let config = SettlementConfig::from_env();

    let db = Database::connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    let broker = NatsEventBroker::connect(
        &config.nats_url,
        Duration::from_millis(config.broker_ack_timeout_ms),
    )
    .await
    .expect("failed to connect to NATS");
    broker
        .ensure_streams()
        .await
        .expect("failed to create JetStream streams");

    let gateway = HttpPaymentGateway::new(
        &config.gateway_base_url,
        &config.gateway_secret_key,
        RetryPolicy::default(),
        Duration::from_millis(config.gateway_timeout_ms),
    )
    .expect("failed to build payment gateway client");

    let alerts = WebhookAlertNotifier::new(config.alert_webhook_url.clone());
    let registry = Registry::new();
    let outbox_wakeup = Arc::new(Notify::new());

    let state = AppState {
        db: db.clone(),
        gateway: gateway.clone(),
        alerts: alerts.clone(),
        registry: registry.clone(),
        outbox_wakeup: Arc::clone(&outbox_wakeup),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let relay = OutboxRelay::new(
        state.outbox_store(),
        broker.clone(),
        RelayConfig {
            poll_interval: Duration::from_secs(config.outbox_poll_secs),
            init_stale_after: chrono::Duration::seconds(config.outbox_stale_secs),
            retry_cap: config.outbox_retry_cap,
            batch: config.outbox_batch,
        },
        Arc::clone(&outbox_wakeup),
        shutdown_rx.clone(),
    );
    tokio::spawn(relay.run());

    let retention = OutboxRetention::new(
        state.outbox_store(),
        chrono::Duration::days(config.outbox_keep_days),
        config.outbox_batch,
        Duration::from_secs(24 * 60 * 60),
        shutdown_rx.clone(),
    );
    tokio::spawn(retention.run());

    let reconciler = ReconcileWorker {
        store: state.settlement_store(),
        gateway: gateway.clone(),
        alerts: alerts.clone(),
        stale_after: chrono::Duration::seconds(config.reconcile_stale_secs),
        batch: config.outbox_batch,
    };
    tokio::spawn(reconciler.run(
        Duration::from_secs(config.reconcile_interval_secs),
        shutdown_rx.clone(),
    ));

    let dlq_monitor = DlqMonitor::new(
        broker.clone(),
        alerts.clone(),
        vec![AGGREGATE_PAYMENT.to_owned(), AGGREGATE_WALLET.to_owned()],
        &registry,
    )
    .expect("failed to build DLQ monitor");
    tokio::spawn(dlq_monitor.run(
        Duration::from_secs(config.dlq_interval_secs),
        shutdown_rx.clone(),
    ));

    let compensator =
        CompensationConsumer::new(state.settlement_store(), broker.jetstream().clone());
    let compensator_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        if let Err(err) = compensator.run(compensator_shutdown).await {
            tracing::error!(error = %err, "compensation consumer exited");
        }
    });

    let router = build_router(state);
    let addr = format!("0.0.0.0:{}", config.settlement_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind");

    info!("settlement service listening on {addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
        .expect("server error");

    // Workers finish their in-flight batches before the process exits.
    let _ = shutdown_tx.send(true);
    tokio::time::sleep(Duration::from_secs(1)).await;
}
