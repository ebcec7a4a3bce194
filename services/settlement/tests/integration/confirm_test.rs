use wonpay_domain::event::EVENT_PAYMENT_CONFIRMED;
use wonpay_domain::payment::{PaymentMethod, PaymentStatus};

use wonpay_settlement::domain::gateway::{GatewayError, GatewayPayment, ProviderStatus};
use wonpay_settlement::domain::types::{AlertSeverity, ConfirmOutcome};
use wonpay_settlement::error::SettlementError;
use wonpay_settlement::usecase::confirm::{ConfirmPaymentInput, ConfirmPaymentUseCase};

use crate::helpers::{MockAlerts, MockGateway, MockStore, pending_payment, test_wallet_id};

fn confirm_input(
    payment: &wonpay_settlement::domain::types::Payment,
    provider_key: &str,
) -> ConfirmPaymentInput {
    ConfirmPaymentInput {
        provider_key: provider_key.to_owned(),
        order_id: payment.order_id.clone(),
        amount: payment.amount.0,
        wallet_id: payment.wallet_id,
    }
}

#[tokio::test]
async fn should_confirm_pending_payment_and_enqueue_event() {
    let wallet_id = test_wallet_id();
    let payment = pending_payment(wallet_id, 15_000);
    let store = MockStore::with_payments(vec![payment.clone()]);
    let gateway = MockGateway::default();
    let usecase = ConfirmPaymentUseCase {
        store: store.clone(),
        gateway: gateway.clone(),
        alerts: MockAlerts::default(),
    };

    let outcome = usecase
        .execute(confirm_input(&payment, "pk_live_1"))
        .await
        .unwrap();

    assert_eq!(outcome, ConfirmOutcome::Applied);
    let stored = store.payment(&payment.order_id);
    assert_eq!(stored.status, PaymentStatus::Success);
    assert_eq!(stored.provider_key.as_deref(), Some("pk_live_1"));
    assert!(stored.paid_at.is_some());
    assert_eq!(store.event_types(), vec![EVENT_PAYMENT_CONFIRMED]);
}

#[tokio::test]
async fn should_treat_replayed_confirm_as_already_confirmed_without_gateway_call() {
    let wallet_id = test_wallet_id();
    let payment = pending_payment(wallet_id, 15_000);
    let store = MockStore::with_payments(vec![payment.clone()]);
    let gateway = MockGateway::default();
    let usecase = ConfirmPaymentUseCase {
        store: store.clone(),
        gateway: gateway.clone(),
        alerts: MockAlerts::default(),
    };

    usecase
        .execute(confirm_input(&payment, "pk_live_1"))
        .await
        .unwrap();
    let outcome = usecase
        .execute(confirm_input(&payment, "pk_live_1"))
        .await
        .unwrap();

    assert_eq!(outcome, ConfirmOutcome::AlreadyConfirmed);
    assert_eq!(gateway.confirm_count(), 1);
}

#[tokio::test]
async fn should_apply_exactly_one_of_concurrent_duplicate_confirms() {
    let wallet_id = test_wallet_id();
    let payment = pending_payment(wallet_id, 15_000);
    let store = MockStore::with_payments(vec![payment.clone()]);
    let gateway = MockGateway::default();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let usecase = ConfirmPaymentUseCase {
            store: store.clone(),
            gateway: gateway.clone(),
            alerts: MockAlerts::default(),
        };
        let input = confirm_input(&payment, "pk_live_1");
        handles.push(tokio::spawn(async move { usecase.execute(input).await.unwrap() }));
    }

    let mut applied = 0;
    for handle in handles {
        match handle.await.unwrap() {
            ConfirmOutcome::Applied => applied += 1,
            ConfirmOutcome::AlreadyConfirmed => {}
        }
    }

    assert_eq!(applied, 1);
    assert_eq!(store.payment(&payment.order_id).status, PaymentStatus::Success);
    assert_eq!(store.event_types(), vec![EVENT_PAYMENT_CONFIRMED]);
    // the wallet was credited exactly once
    assert_eq!(store.event_types(), vec![EVENT_PAYMENT_CONFIRMED]);
}

#[tokio::test]
async fn should_reject_confirm_for_foreign_wallet_before_touching_gateway() {
    let payment = pending_payment(test_wallet_id(), 15_000);
    let store = MockStore::with_payments(vec![payment.clone()]);
    let gateway = MockGateway::default();
    let usecase = ConfirmPaymentUseCase {
        store,
        gateway: gateway.clone(),
        alerts: MockAlerts::default(),
    };

    let mut input = confirm_input(&payment, "pk_live_1");
    input.wallet_id = test_wallet_id();
    let result = usecase.execute(input).await;

    assert!(matches!(result, Err(SettlementError::OwnershipMismatch)));
    assert_eq!(gateway.confirm_count(), 0);
}

#[tokio::test]
async fn should_reject_confirm_on_amount_mismatch() {
    let payment = pending_payment(test_wallet_id(), 15_000);
    let store = MockStore::with_payments(vec![payment.clone()]);
    let gateway = MockGateway::default();
    let usecase = ConfirmPaymentUseCase {
        store,
        gateway: gateway.clone(),
        alerts: MockAlerts::default(),
    };

    let mut input = confirm_input(&payment, "pk_live_1");
    input.amount = 14_999;
    let result = usecase.execute(input).await;

    assert!(matches!(result, Err(SettlementError::AmountMismatch)));
    assert_eq!(gateway.confirm_count(), 0);
}

#[tokio::test]
async fn should_propagate_transient_gateway_failure_without_auto_cancel() {
    let payment = pending_payment(test_wallet_id(), 15_000);
    let store = MockStore::with_payments(vec![payment.clone()]);
    let gateway = MockGateway::default();
    gateway.script_confirm(Err(GatewayError::Transient("provider down".to_owned())));
    let usecase = ConfirmPaymentUseCase {
        store: store.clone(),
        gateway: gateway.clone(),
        alerts: MockAlerts::default(),
    };

    let result = usecase.execute(confirm_input(&payment, "pk_live_1")).await;

    assert!(matches!(result, Err(SettlementError::GatewayUnavailable(_))));
    // no money moved anywhere, so nothing to undo
    assert_eq!(gateway.cancel_count(), 0);
    assert_eq!(store.payment(&payment.order_id).status, PaymentStatus::Pending);
}

#[tokio::test]
async fn should_propagate_gateway_rejection_without_auto_cancel() {
    let payment = pending_payment(test_wallet_id(), 15_000);
    let store = MockStore::with_payments(vec![payment.clone()]);
    let gateway = MockGateway::default();
    gateway.script_confirm(Err(GatewayError::Rejected {
        code: "NOT_ENOUGH_BALANCE".to_owned(),
        message: "card declined".to_owned(),
    }));
    let usecase = ConfirmPaymentUseCase {
        store,
        gateway: gateway.clone(),
        alerts: MockAlerts::default(),
    };

    let result = usecase.execute(confirm_input(&payment, "pk_live_1")).await;

    assert!(matches!(
        result,
        Err(SettlementError::GatewayRejected { .. })
    ));
    assert_eq!(gateway.cancel_count(), 0);
}

#[tokio::test]
async fn should_auto_cancel_provider_charge_when_local_commit_fails() {
    let payment = pending_payment(test_wallet_id(), 15_000);
    let mut store = MockStore::with_payments(vec![payment.clone()]);
    store.fail_commit_confirmation = true;
    let gateway = MockGateway::default();
    let alerts = MockAlerts::default();
    let usecase = ConfirmPaymentUseCase {
        store: store.clone(),
        gateway: gateway.clone(),
        alerts: alerts.clone(),
    };

    let result = usecase.execute(confirm_input(&payment, "pk_live_1")).await;

    assert!(matches!(result, Err(SettlementError::Internal(_))));
    assert_eq!(gateway.cancel_count(), 1);
    let stored = store.payment(&payment.order_id);
    assert_eq!(stored.status, PaymentStatus::Canceled);
    assert!(stored.failure_code.is_some());
    let recorded = alerts.alerts.lock().unwrap();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].severity, AlertSeverity::Info);
}

#[tokio::test]
async fn should_auto_cancel_when_confirm_answers_with_unsettled_status() {
    let payment = pending_payment(test_wallet_id(), 15_000);
    let store = MockStore::with_payments(vec![payment.clone()]);
    let gateway = MockGateway::default();
    gateway.script_confirm(Ok(GatewayPayment {
        provider_key: "pk_live_1".to_owned(),
        status: ProviderStatus::Waiting,
        method: Some(PaymentMethod::Card),
        approved_at: None,
    }));
    let alerts = MockAlerts::default();
    let usecase = ConfirmPaymentUseCase {
        store: store.clone(),
        gateway: gateway.clone(),
        alerts: alerts.clone(),
    };

    let result = usecase.execute(confirm_input(&payment, "pk_live_1")).await;

    assert!(matches!(result, Err(SettlementError::Internal(_))));
    assert_eq!(gateway.cancel_count(), 1);
    assert_eq!(store.payment(&payment.order_id).status, PaymentStatus::Canceled);
    assert!(store.event_types().is_empty());
}

#[tokio::test]
async fn should_treat_already_canceled_auto_cancel_as_success() {
    let payment = pending_payment(test_wallet_id(), 15_000);
    let mut store = MockStore::with_payments(vec![payment.clone()]);
    store.fail_commit_confirmation = true;
    let gateway = MockGateway::default();
    gateway.script_cancel(Err(GatewayError::Rejected {
        code: "ALREADY_CANCELED_PAYMENT".to_owned(),
        message: "already refunded".to_owned(),
    }));
    let alerts = MockAlerts::default();
    let usecase = ConfirmPaymentUseCase {
        store: store.clone(),
        gateway,
        alerts: alerts.clone(),
    };

    let result = usecase.execute(confirm_input(&payment, "pk_live_1")).await;

    assert!(result.is_err());
    assert_eq!(store.payment(&payment.order_id).status, PaymentStatus::Canceled);
    let recorded = alerts.alerts.lock().unwrap();
    assert_eq!(recorded[0].severity, AlertSeverity::Info);
}

#[tokio::test]
async fn should_escalate_to_critical_alert_when_auto_cancel_fails() {
    let payment = pending_payment(test_wallet_id(), 15_000);
    let mut store = MockStore::with_payments(vec![payment.clone()]);
    store.fail_commit_confirmation = true;
    let gateway = MockGateway::default();
    gateway.script_cancel(Err(GatewayError::Transient("provider down".to_owned())));
    let alerts = MockAlerts::default();
    let usecase = ConfirmPaymentUseCase {
        store: store.clone(),
        gateway,
        alerts: alerts.clone(),
    };

    let result = usecase.execute(confirm_input(&payment, "pk_live_1")).await;

    assert!(result.is_err());
    // local row untouched: reconciliation owns it from here
    assert_eq!(store.payment(&payment.order_id).status, PaymentStatus::Pending);
    let recorded = alerts.alerts.lock().unwrap();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].severity, AlertSeverity::Critical);
}
