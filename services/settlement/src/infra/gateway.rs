use std::time::Duration;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use wonpay_domain::id::OrderId;
use wonpay_domain::money::Money;
use wonpay_domain::payment::PaymentMethod;

use crate::domain::gateway::{
    GatewayError, GatewayPayment, ProviderStatus, RetryPolicy, classify_provider_code,
};
use crate::domain::repository::PaymentGateway;

/// HTTP adapter for the external payment provider.
///
/// Authentication is HTTP basic with the merchant secret key. Idempotency
/// keys are derived deterministically from order id / provider key so the
/// provider deduplicates repeated calls for the same logical operation.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
    retry: RetryPolicy,
}

impl HttpPaymentGateway {
    pub fn new(
        base_url: &str,
        secret_key: &str,
        retry: RetryPolicy,
        timeout: Duration,
    ) -> Result<Self, anyhow::Error> {
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .context("build gateway HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            secret_key: secret_key.to_owned(),
            retry,
        })
    }

    async fn confirm_once(
        &self,
        provider_key: &str,
        order_id: &OrderId,
        amount: Money,
    ) -> Result<GatewayPayment, GatewayError> {
        let request = self
            .http
            .post(format!("{}/v1/payments/confirm", self.base_url))
            .basic_auth(&self.secret_key, Some(""))
            .header("Idempotency-Key", format!("confirm-{order_id}"))
            .json(&json!({
                "paymentKey": provider_key,
                "orderId": order_id,
                "amount": amount,
            }));
        let body = send(request).await?;
        payment_from_body(body)
    }

    async fn cancel_once(
        &self,
        provider_key: &str,
        reason: &str,
    ) -> Result<GatewayPayment, GatewayError> {
        let request = self
            .http
            .post(format!(
                "{}/v1/payments/{provider_key}/cancel",
                self.base_url
            ))
            .basic_auth(&self.secret_key, Some(""))
            .header("Idempotency-Key", format!("cancel-{provider_key}"))
            .json(&json!({ "cancelReason": reason }));
        let body = send(request).await?;
        payment_from_body(body)
    }

    async fn inquire_once(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<GatewayPayment>, GatewayError> {
        let request = self
            .http
            .get(format!(
                "{}/v1/payments/orders/{order_id}",
                self.base_url
            ))
            .basic_auth(&self.secret_key, Some(""));
        match send(request).await {
            Ok(body) => payment_from_body(body).map(Some),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }
}

impl PaymentGateway for HttpPaymentGateway {
    async fn confirm(
        &self,
        provider_key: &str,
        order_id: &OrderId,
        amount: Money,
    ) -> Result<GatewayPayment, GatewayError> {
        self.retry
            .run(|| self.confirm_once(provider_key, order_id, amount))
            .await
    }

    async fn cancel(
        &self,
        provider_key: &str,
        reason: &str,
    ) -> Result<GatewayPayment, GatewayError> {
        self.retry
            .run(|| self.cancel_once(provider_key, reason))
            .await
    }

    async fn inquire_by_order_id(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<GatewayPayment>, GatewayError> {
        self.retry.run(|| self.inquire_once(order_id)).await
    }
}

#[derive(Debug, Deserialize)]
struct ProviderPaymentBody {
    #[serde(rename = "paymentKey")]
    payment_key: String,
    status: String,
    method: Option<String>,
    #[serde(rename = "approvedAt")]
    approved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    code: String,
    message: String,
}

async fn send(request: reqwest::RequestBuilder) -> Result<ProviderPaymentBody, GatewayError> {
    let response = request
        .send()
        .await
        .map_err(|err| GatewayError::Transient(err.to_string()))?;
    let status = response.status();
    if status.is_success() {
        response
            .json()
            .await
            .map_err(|err| GatewayError::Transient(format!("malformed provider response: {err}")))
    } else if status.is_server_error() {
        Err(GatewayError::Transient(format!(
            "provider returned {status}"
        )))
    } else {
        let body: ProviderErrorBody = response
            .json()
            .await
            .map_err(|err| GatewayError::Transient(format!("malformed provider error: {err}")))?;
        Err(classify_provider_code(&body.code, &body.message))
    }
}

fn payment_from_body(body: ProviderPaymentBody) -> Result<GatewayPayment, GatewayError> {
    let status = provider_status(&body.status)?;
    Ok(GatewayPayment {
        provider_key: body.payment_key,
        status,
        method: body.method.as_deref().and_then(payment_method),
        approved_at: body.approved_at,
    })
}

fn provider_status(raw: &str) -> Result<ProviderStatus, GatewayError> {
    match raw {
        "DONE" => Ok(ProviderStatus::Done),
        "CANCELED" | "PARTIAL_CANCELED" => Ok(ProviderStatus::Canceled),
        "ABORTED" | "EXPIRED" => Ok(ProviderStatus::Aborted),
        "READY" | "WAITING_FOR_DEPOSIT" => Ok(ProviderStatus::Waiting),
        "IN_PROGRESS" => Ok(ProviderStatus::InProgress),
        // an unknown status is never a definitive outcome
        other => Err(GatewayError::Transient(format!(
            "unknown provider status {other}"
        ))),
    }
}

fn payment_method(raw: &str) -> Option<PaymentMethod> {
    match raw {
        "CARD" => Some(PaymentMethod::Card),
        "EASY_PAY" => Some(PaymentMethod::EasyPay),
        "MOBILE_PHONE" => Some(PaymentMethod::MobileCarrier),
        "GIFT_CERTIFICATE" => Some(PaymentMethod::GiftCertificate),
        _ => None,
    }
}
