use serde_json::json;

use crate::domain::repository::AlertNotifier;
use crate::domain::types::{Alert, AlertSeverity};

/// Delivers alerts to an operations webhook.
///
/// Delivery is best effort. A failed or missing webhook never fails the
/// operation that raised the alert; every alert is also written to the log.
#[derive(Clone)]
pub struct WebhookAlertNotifier {
    http: reqwest::Client,
    webhook_url: Option<String>,
}

impl WebhookAlertNotifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            webhook_url,
        }
    }
}

impl AlertNotifier for WebhookAlertNotifier {
    async fn notify(&self, alert: Alert) {
        match alert.severity {
            AlertSeverity::Info => {
                tracing::info!(title = %alert.title, fields = ?alert.fields, "alert")
            }
            AlertSeverity::Critical => {
                tracing::error!(title = %alert.title, fields = ?alert.fields, "alert")
            }
        }

        let Some(url) = &self.webhook_url else {
            return;
        };
        let fields: serde_json::Map<_, _> = alert
            .fields
            .iter()
            .map(|(key, value)| (key.clone(), serde_json::Value::String(value.clone())))
            .collect();
        let body = json!({
            "severity": alert.severity.as_str(),
            "title": alert.title,
            "fields": fields,
        });
        let sent = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .and_then(|response| response.error_for_status());
        if let Err(err) = sent {
            tracing::warn!(error = %err, title = %alert.title, "alert delivery failed");
        }
    }
}
