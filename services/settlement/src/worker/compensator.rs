//! Consumer for `payment.compensation_requested` events.
//!
//! Pulls from a durable JetStream consumer, applies the wallet debit through
//! the store and acks. Infrastructure failures are nacked for redelivery;
//! messages the store rejects terminally are parked on the dead-letter
//! subject so the DLQ monitor surfaces them.

use std::time::Duration;

use anyhow::Context as _;
use async_nats::jetstream::{self, AckKind, consumer};
use futures::StreamExt as _;
use serde::Deserialize;
use tokio::sync::watch;

use wonpay_domain::event::{AGGREGATE_PAYMENT, EVENT_COMPENSATION_REQUESTED};
use wonpay_domain::id::PaymentId;

use crate::error::SettlementError;
use crate::usecase::compensation::CompensateCancellationUseCase;

const CONSUMER_NAME: &str = "settlement-compensator";
const REDELIVERY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct CompensationPayload {
    payment_id: PaymentId,
}

pub struct CompensationConsumer<S>
where
    S: crate::domain::repository::SettlementStore,
{
    usecase: CompensateCancellationUseCase<S>,
    jetstream: jetstream::Context,
}

impl<S> CompensationConsumer<S>
where
    S: crate::domain::repository::SettlementStore,
{
    pub fn new(store: S, jetstream: jetstream::Context) -> Self {
        Self {
            usecase: CompensateCancellationUseCase { store },
            jetstream,
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), anyhow::Error> {
        let stream = self
            .jetstream
            .get_stream(AGGREGATE_PAYMENT)
            .await
            .context("get payment stream")?;
        let subject = format!("{AGGREGATE_PAYMENT}.{EVENT_COMPENSATION_REQUESTED}");
        let consumer: consumer::PullConsumer = stream
            .get_or_create_consumer(
                CONSUMER_NAME,
                consumer::pull::Config {
                    durable_name: Some(CONSUMER_NAME.to_owned()),
                    filter_subject: subject,
                    ack_policy: consumer::AckPolicy::Explicit,
                    ..Default::default()
                },
            )
            .await
            .context("create compensation consumer")?;
        let mut messages = consumer
            .messages()
            .await
            .context("subscribe compensation consumer")?;
        tracing::info!("compensation consumer started");

        loop {
            tokio::select! {
                message = messages.next() => match message {
                    Some(Ok(message)) => self.handle(message).await,
                    Some(Err(err)) => {
                        tracing::warn!(error = %err, "compensation consumer stream error");
                    }
                    None => {
                        tracing::warn!("compensation consumer stream closed");
                        break;
                    }
                },
                _ = shutdown.changed() => break,
            }
        }
        tracing::info!("compensation consumer stopped");
        Ok(())
    }

    async fn handle(&self, message: jetstream::Message) {
        let payload: CompensationPayload = match serde_json::from_slice(&message.payload) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!(error = %err, "malformed compensation event");
                self.park(&message).await;
                return;
            }
        };
        match self.usecase.execute(payload.payment_id).await {
            Ok(_) => ack(&message).await,
            Err(err) if is_transient(&err) => {
                tracing::warn!(
                    payment_id = %payload.payment_id,
                    error = %err,
                    "compensation failed, requesting redelivery"
                );
                if let Err(nak_err) = message
                    .ack_with(AckKind::Nak(Some(REDELIVERY_DELAY)))
                    .await
                {
                    tracing::warn!(error = %nak_err, "compensation nak failed");
                }
            }
            Err(err) => {
                tracing::error!(
                    payment_id = %payload.payment_id,
                    error = %err,
                    "compensation rejected, parking on DLQ"
                );
                self.park(&message).await;
            }
        }
    }

    /// Moves the message to the dead-letter subject and acks the original so
    /// redelivery stops. The DLQ monitor takes it from there.
    async fn park(&self, message: &jetstream::Message) {
        let dlq_subject = format!("dlq.{}", message.subject);
        let published = self
            .jetstream
            .publish(dlq_subject, message.payload.clone())
            .await;
        match published {
            Ok(publish) => {
                if let Err(err) = publish.await {
                    tracing::error!(error = %err, "DLQ publish unacknowledged, leaving for redelivery");
                    return;
                }
                ack(message).await;
            }
            Err(err) => {
                // Redelivery will retry the park later.
                tracing::error!(error = %err, "DLQ publish failed, leaving for redelivery");
            }
        }
    }
}

async fn ack(message: &jetstream::Message) {
    if let Err(err) = message.ack().await {
        tracing::warn!(error = %err, "compensation ack failed");
    }
}

fn is_transient(err: &SettlementError) -> bool {
    matches!(
        err,
        SettlementError::Internal(_) | SettlementError::GatewayUnavailable(_)
    )
}
