use chrono::{Duration, Utc};

use wonpay_domain::event::{EVENT_COMPENSATION_REQUESTED, EVENT_PAYMENT_CANCELED};
use wonpay_domain::payment::{PaymentMethod, PaymentStatus};

use wonpay_settlement::domain::gateway::GatewayError;
use wonpay_settlement::domain::repository::SettlementStore;
use wonpay_settlement::domain::types::{AlertSeverity, CancelOutcome, CompensationOutcome, Payment};
use wonpay_settlement::error::SettlementError;
use wonpay_settlement::usecase::cancel::{CancelPaymentInput, CancelPaymentUseCase};
use wonpay_settlement::usecase::compensation::CompensateCancellationUseCase;

use crate::helpers::{
    MockAlerts, MockGateway, MockLedger, MockStore, success_payment, test_wallet_id,
};

fn cancel_input(payment: &Payment) -> CancelPaymentInput {
    CancelPaymentInput {
        order_id: payment.order_id.clone(),
        wallet_id: payment.wallet_id,
        reason: "customer asked".to_owned(),
    }
}

fn usecase(
    store: &MockStore,
    ledger: &MockLedger,
    gateway: &MockGateway,
    alerts: &MockAlerts,
) -> CancelPaymentUseCase<MockStore, MockLedger, MockGateway, MockAlerts> {
    CancelPaymentUseCase {
        store: store.clone(),
        ledger: ledger.clone(),
        gateway: gateway.clone(),
        alerts: alerts.clone(),
    }
}

#[tokio::test]
async fn should_cancel_confirmed_payment_and_enqueue_event() {
    let wallet_id = test_wallet_id();
    let payment = success_payment(wallet_id, 15_000, PaymentMethod::Card);
    let store = MockStore::with_payments(vec![payment.clone()]);
    let ledger = MockLedger::with_balance(wallet_id, 20_000);
    let gateway = MockGateway::default();
    let alerts = MockAlerts::default();

    let outcome = usecase(&store, &ledger, &gateway, &alerts)
        .execute(cancel_input(&payment))
        .await
        .unwrap();

    assert_eq!(outcome, CancelOutcome::Applied);
    let stored = store.payment(&payment.order_id);
    assert_eq!(stored.status, PaymentStatus::Canceled);
    assert_eq!(stored.cancel_reason.as_deref(), Some("customer asked"));
    assert_eq!(store.event_types(), vec![EVENT_PAYMENT_CANCELED]);
    let calls = gateway.cancel_calls.lock().unwrap();
    assert_eq!(calls[0], ("pk_test_success".to_owned(), "customer asked".to_owned()));
}

#[tokio::test]
async fn should_reject_cancel_when_credited_money_was_spent() {
    let wallet_id = test_wallet_id();
    let payment = success_payment(wallet_id, 15_000, PaymentMethod::Card);
    let store = MockStore::with_payments(vec![payment.clone()]);
    let ledger = MockLedger::with_balance(wallet_id, 4_000);
    let gateway = MockGateway::default();
    let alerts = MockAlerts::default();

    let result = usecase(&store, &ledger, &gateway, &alerts)
        .execute(cancel_input(&payment))
        .await;

    assert!(matches!(
        result,
        Err(SettlementError::AlreadyUsedCannotCancel)
    ));
    assert_eq!(gateway.cancel_count(), 0);
    assert_eq!(store.payment(&payment.order_id).status, PaymentStatus::Success);
}

#[tokio::test]
async fn should_reject_gift_certificate_cancel() {
    let wallet_id = test_wallet_id();
    let payment = success_payment(wallet_id, 15_000, PaymentMethod::GiftCertificate);
    let store = MockStore::with_payments(vec![payment.clone()]);
    let ledger = MockLedger::with_balance(wallet_id, 20_000);
    let gateway = MockGateway::default();
    let alerts = MockAlerts::default();

    let result = usecase(&store, &ledger, &gateway, &alerts)
        .execute(cancel_input(&payment))
        .await;

    assert!(matches!(result, Err(SettlementError::PeriodExpired)));
    assert_eq!(gateway.cancel_count(), 0);
}

#[tokio::test]
async fn should_reject_cancel_after_settlement_month_closed() {
    let wallet_id = test_wallet_id();
    let mut payment = success_payment(wallet_id, 15_000, PaymentMethod::Card);
    payment.paid_at = Some(Utc::now() - Duration::days(40));
    let store = MockStore::with_payments(vec![payment.clone()]);
    let ledger = MockLedger::with_balance(wallet_id, 20_000);
    let gateway = MockGateway::default();
    let alerts = MockAlerts::default();

    let result = usecase(&store, &ledger, &gateway, &alerts)
        .execute(cancel_input(&payment))
        .await;

    assert!(matches!(result, Err(SettlementError::PeriodExpired)));
}

#[tokio::test]
async fn should_treat_replayed_cancel_as_already_canceled() {
    let wallet_id = test_wallet_id();
    let payment = success_payment(wallet_id, 15_000, PaymentMethod::Card);
    let store = MockStore::with_payments(vec![payment.clone()]);
    let ledger = MockLedger::with_balance(wallet_id, 20_000);
    let gateway = MockGateway::default();
    let alerts = MockAlerts::default();
    let usecase = usecase(&store, &ledger, &gateway, &alerts);

    usecase.execute(cancel_input(&payment)).await.unwrap();
    let outcome = usecase.execute(cancel_input(&payment)).await.unwrap();

    assert_eq!(outcome, CancelOutcome::AlreadyCanceled);
    // the wallet was debited exactly once and the provider called exactly once
    assert_eq!(gateway.cancel_count(), 1);
    assert_eq!(store.event_types(), vec![EVENT_PAYMENT_CANCELED]);
}

#[tokio::test]
async fn should_treat_provider_already_canceled_as_refund_success() {
    let wallet_id = test_wallet_id();
    let payment = success_payment(wallet_id, 15_000, PaymentMethod::Card);
    let store = MockStore::with_payments(vec![payment.clone()]);
    let ledger = MockLedger::with_balance(wallet_id, 20_000);
    let gateway = MockGateway::default();
    gateway.script_cancel(Err(GatewayError::Rejected {
        code: "ALREADY_CANCELED_PAYMENT".to_owned(),
        message: "already refunded".to_owned(),
    }));
    let alerts = MockAlerts::default();

    let outcome = usecase(&store, &ledger, &gateway, &alerts)
        .execute(cancel_input(&payment))
        .await
        .unwrap();

    // provider refunded earlier (e.g. crashed attempt); local row still closes
    assert_eq!(outcome, CancelOutcome::Applied);
    assert_eq!(store.payment(&payment.order_id).status, PaymentStatus::Canceled);
}

#[tokio::test]
async fn should_apply_exactly_one_of_concurrent_duplicate_cancels() {
    let wallet_id = test_wallet_id();
    let payment = success_payment(wallet_id, 15_000, PaymentMethod::Card);
    let store = MockStore::with_payments(vec![payment.clone()]);
    let ledger = MockLedger::with_balance(wallet_id, 20_000);
    let gateway = MockGateway::default();
    let alerts = MockAlerts::default();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let usecase = usecase(&store, &ledger, &gateway, &alerts);
        let input = cancel_input(&payment);
        handles.push(tokio::spawn(async move { usecase.execute(input).await.unwrap() }));
    }

    let mut applied = 0;
    for handle in handles {
        match handle.await.unwrap() {
            CancelOutcome::Applied => applied += 1,
            CancelOutcome::AlreadyCanceled => {}
        }
    }

    assert_eq!(applied, 1);
    assert_eq!(store.payment(&payment.order_id).status, PaymentStatus::Canceled);
    assert_eq!(store.event_types(), vec![EVENT_PAYMENT_CANCELED]);
}

#[tokio::test]
async fn should_enqueue_compensation_when_local_commit_fails_after_refund() {
    let wallet_id = test_wallet_id();
    let payment = success_payment(wallet_id, 15_000, PaymentMethod::Card);
    let mut store = MockStore::with_payments(vec![payment.clone()]);
    store.fail_commit_cancellation = true;
    let ledger = MockLedger::with_balance(wallet_id, 20_000);
    let gateway = MockGateway::default();
    let alerts = MockAlerts::default();

    let result = usecase(&store, &ledger, &gateway, &alerts)
        .execute(cancel_input(&payment))
        .await;

    assert!(matches!(result, Err(SettlementError::Internal(_))));
    let stored = store.payment(&payment.order_id);
    assert_eq!(stored.status, PaymentStatus::Canceled);
    assert!(!stored.compensation_completed);
    assert_eq!(store.event_types(), vec![EVENT_COMPENSATION_REQUESTED]);
    assert_eq!(alerts.count(), 0);
}

#[tokio::test]
async fn should_raise_critical_alert_when_compensation_enqueue_also_fails() {
    let wallet_id = test_wallet_id();
    let payment = success_payment(wallet_id, 15_000, PaymentMethod::Card);
    let mut store = MockStore::with_payments(vec![payment.clone()]);
    store.fail_commit_cancellation = true;
    store.fail_force_cancel = true;
    let ledger = MockLedger::with_balance(wallet_id, 20_000);
    let gateway = MockGateway::default();
    let alerts = MockAlerts::default();

    let result = usecase(&store, &ledger, &gateway, &alerts)
        .execute(cancel_input(&payment))
        .await;

    assert!(result.is_err());
    let recorded = alerts.alerts.lock().unwrap();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].severity, AlertSeverity::Critical);
    let keys: Vec<_> = recorded[0].fields.iter().map(|(k, _)| k.as_str()).collect();
    assert!(keys.contains(&"original_error"));
    assert!(keys.contains(&"compensation_error"));
}

#[tokio::test]
async fn should_apply_compensation_exactly_once() {
    let wallet_id = test_wallet_id();
    let payment = success_payment(wallet_id, 15_000, PaymentMethod::Card);
    let mut canceled = payment.clone();
    canceled.status = PaymentStatus::Canceled;
    canceled.compensation_completed = false;
    let store = MockStore::with_payments(vec![canceled]);
    let usecase = CompensateCancellationUseCase {
        store: store.clone(),
    };

    let first = usecase.execute(payment.id).await.unwrap();
    let second = usecase.execute(payment.id).await.unwrap();

    assert_eq!(first, CompensationOutcome::Applied);
    assert_eq!(second, CompensationOutcome::AlreadyCompensated);
}

// Race between a committed cancel and a lost duplicate: the loser force-cancels
// and enqueues compensation, but the winner's debit already wrote the ledger
// row, so the event must not debit again.
#[tokio::test]
async fn should_skip_compensation_when_cancel_already_debited() {
    let wallet_id = test_wallet_id();
    let payment = success_payment(wallet_id, 15_000, PaymentMethod::Card);
    let store = MockStore::with_payments(vec![payment.clone()]);
    let ledger = MockLedger::with_balance(wallet_id, 20_000);
    let gateway = MockGateway::default();
    let alerts = MockAlerts::default();

    let outcome = usecase(&store, &ledger, &gateway, &alerts)
        .execute(cancel_input(&payment))
        .await
        .unwrap();
    assert_eq!(outcome, CancelOutcome::Applied);

    let event = wonpay_domain::event::DomainEvent::compensation_requested(
        payment.id,
        payment.wallet_id,
        payment.amount,
        "duplicate cancel lost the race",
    );
    store
        .force_cancel_with_compensation(payment.id, "duplicate cancel lost the race", &event)
        .await
        .unwrap();

    let compensator = CompensateCancellationUseCase {
        store: store.clone(),
    };
    let result = compensator.execute(payment.id).await.unwrap();

    assert_eq!(result, CompensationOutcome::AlreadyCompensated);
    assert!(store.payment(&payment.order_id).compensation_completed);
}
