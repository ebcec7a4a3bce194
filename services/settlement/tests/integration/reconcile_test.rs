use chrono::{Duration, Utc};

use wonpay_domain::payment::PaymentStatus;

use wonpay_settlement::domain::gateway::{GatewayError, ProviderStatus};
use wonpay_settlement::domain::types::{AlertSeverity, Payment};
use wonpay_settlement::worker::reconcile::{ReconcileReport, ReconcileWorker};

use crate::helpers::{
    MockAlerts, MockGateway, MockStore, done_gateway_payment, pending_payment, test_wallet_id,
};

fn stale(mut payment: Payment) -> Payment {
    payment.created_at = Utc::now() - Duration::minutes(30);
    payment
}

fn worker(
    store: &MockStore,
    gateway: &MockGateway,
    alerts: &MockAlerts,
) -> ReconcileWorker<MockStore, MockGateway, MockAlerts> {
    ReconcileWorker {
        store: store.clone(),
        gateway: gateway.clone(),
        alerts: alerts.clone(),
        stale_after: Duration::minutes(10),
        batch: 100,
    }
}

#[tokio::test]
async fn should_refund_and_close_payment_the_provider_charged() {
    let payment = stale(pending_payment(test_wallet_id(), 15_000));
    let store = MockStore::with_payments(vec![payment.clone()]);
    let gateway = MockGateway::default();
    gateway.script_inquire(Ok(Some(done_gateway_payment("pk_orphan"))));
    let alerts = MockAlerts::default();

    let report = worker(&store, &gateway, &alerts).run_cycle().await.unwrap();

    assert_eq!(report.resolved, 1);
    let stored = store.payment(&payment.order_id);
    assert_eq!(stored.status, PaymentStatus::Canceled);
    // the refund went to the key the provider reported, not a local one
    let calls = gateway.cancel_calls.lock().unwrap();
    assert_eq!(calls[0].0, "pk_orphan");
    assert_eq!(alerts.count(), 1);
}

#[tokio::test]
async fn should_close_payment_unknown_to_the_provider_without_refund() {
    let payment = stale(pending_payment(test_wallet_id(), 15_000));
    let store = MockStore::with_payments(vec![payment.clone()]);
    let gateway = MockGateway::default();
    gateway.script_inquire(Ok(None));
    let alerts = MockAlerts::default();

    let report = worker(&store, &gateway, &alerts).run_cycle().await.unwrap();

    assert_eq!(report.resolved, 1);
    assert_eq!(gateway.cancel_count(), 0);
    assert_eq!(store.payment(&payment.order_id).status, PaymentStatus::Canceled);
}

#[tokio::test]
async fn should_leave_in_flight_provider_payment_alone() {
    let payment = stale(pending_payment(test_wallet_id(), 15_000));
    let store = MockStore::with_payments(vec![payment.clone()]);
    let gateway = MockGateway::default();
    let mut waiting = done_gateway_payment("pk_waiting");
    waiting.status = ProviderStatus::Waiting;
    gateway.script_inquire(Ok(Some(waiting)));
    let alerts = MockAlerts::default();

    let report = worker(&store, &gateway, &alerts).run_cycle().await.unwrap();

    assert_eq!(report, ReconcileReport { resolved: 0, skipped: 1, failed: 0 });
    assert_eq!(store.payment(&payment.order_id).status, PaymentStatus::Pending);
}

#[tokio::test]
async fn should_skip_cycle_decisions_while_provider_is_unreachable() {
    let payment = stale(pending_payment(test_wallet_id(), 15_000));
    let store = MockStore::with_payments(vec![payment.clone()]);
    let gateway = MockGateway::default();
    gateway.script_inquire(Err(GatewayError::Transient("provider down".to_owned())));
    let alerts = MockAlerts::default();

    let report = worker(&store, &gateway, &alerts).run_cycle().await.unwrap();

    assert_eq!(report.skipped, 1);
    assert_eq!(store.payment(&payment.order_id).status, PaymentStatus::Pending);
    assert_eq!(alerts.count(), 0);
}

#[tokio::test]
async fn should_alert_on_rejected_inquiry_and_leave_payment_untouched() {
    let payment = stale(pending_payment(test_wallet_id(), 15_000));
    let store = MockStore::with_payments(vec![payment.clone()]);
    let gateway = MockGateway::default();
    gateway.script_inquire(Err(GatewayError::Rejected {
        code: "INVALID_ORDER_ID".to_owned(),
        message: "bad order".to_owned(),
    }));
    let alerts = MockAlerts::default();

    let report = worker(&store, &gateway, &alerts).run_cycle().await.unwrap();

    assert_eq!(report.skipped, 1);
    let recorded = alerts.alerts.lock().unwrap();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].severity, AlertSeverity::Critical);
}

#[tokio::test]
async fn should_finish_interrupted_refund_on_the_next_cycle() {
    let payment = stale(pending_payment(test_wallet_id(), 15_000));
    let store = MockStore::with_payments(vec![payment.clone()]);
    let gateway = MockGateway::default();
    let alerts = MockAlerts::default();
    let worker = worker(&store, &gateway, &alerts);

    // First cycle: provider charged, but the refund call fails transiently.
    gateway.script_inquire(Ok(Some(done_gateway_payment("pk_orphan"))));
    gateway.script_cancel(Err(GatewayError::Transient("timeout".to_owned())));
    let first = worker.run_cycle().await.unwrap();
    assert_eq!(first.skipped, 1);
    assert_eq!(
        store.payment(&payment.order_id).status,
        PaymentStatus::CancelRequested
    );

    // Second cycle revisits the CANCEL_REQUESTED row and completes it.
    gateway.script_inquire(Ok(Some(done_gateway_payment("pk_orphan"))));
    let second = worker.run_cycle().await.unwrap();
    assert_eq!(second.resolved, 1);
    assert_eq!(store.payment(&payment.order_id).status, PaymentStatus::Canceled);
}

#[tokio::test]
async fn should_ignore_payments_younger_than_the_stale_threshold() {
    let payment = pending_payment(test_wallet_id(), 15_000);
    let store = MockStore::with_payments(vec![payment.clone()]);
    let gateway = MockGateway::default();
    let alerts = MockAlerts::default();

    let report = worker(&store, &gateway, &alerts).run_cycle().await.unwrap();

    assert_eq!(report, ReconcileReport::default());
    assert_eq!(store.payment(&payment.order_id).status, PaymentStatus::Pending);
}
