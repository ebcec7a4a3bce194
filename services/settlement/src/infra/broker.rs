use std::time::Duration;

use anyhow::Context as _;
use async_nats::jetstream;

use wonpay_domain::event::{AGGREGATE_PAYMENT, AGGREGATE_WALLET};

use crate::domain::repository::{BrokerAdmin, BrokerError, EventBroker};

/// JetStream-backed event broker.
///
/// Each aggregate type owns one stream subscribing to `{aggregate}.>`, plus
/// a dead-letter stream `dlq-{aggregate}` that consumers publish to after
/// exhausting their redeliveries. Publishes carry the outbox event id as the
/// `Nats-Msg-Id` header so the server drops duplicates inside its dedupe
/// window.
#[derive(Clone)]
pub struct NatsEventBroker {
    jetstream: jetstream::Context,
    ack_timeout: Duration,
}

impl NatsEventBroker {
    pub async fn connect(url: &str, ack_timeout: Duration) -> Result<Self, anyhow::Error> {
        let client = async_nats::connect(url)
            .await
            .context("connect to NATS")?;
        Ok(Self {
            jetstream: jetstream::new(client),
            ack_timeout,
        })
    }

    /// Creates the aggregate and dead-letter streams if they do not exist.
    pub async fn ensure_streams(&self) -> Result<(), anyhow::Error> {
        for aggregate in [AGGREGATE_PAYMENT, AGGREGATE_WALLET] {
            self.jetstream
                .get_or_create_stream(jetstream::stream::Config {
                    name: aggregate.to_owned(),
                    subjects: vec![format!("{aggregate}.>")],
                    ..Default::default()
                })
                .await
                .with_context(|| format!("create stream {aggregate}"))?;
            self.jetstream
                .get_or_create_stream(jetstream::stream::Config {
                    name: format!("dlq-{aggregate}"),
                    subjects: vec![format!("dlq.{aggregate}.>")],
                    ..Default::default()
                })
                .await
                .with_context(|| format!("create stream dlq-{aggregate}"))?;
        }
        Ok(())
    }

    pub fn jetstream(&self) -> &jetstream::Context {
        &self.jetstream
    }
}

impl EventBroker for NatsEventBroker {
    async fn publish(
        &self,
        subject: &str,
        event_id: uuid::Uuid,
        payload: &serde_json::Value,
    ) -> Result<(), BrokerError> {
        let bytes =
            serde_json::to_vec(payload).map_err(|err| BrokerError::Rejected(err.to_string()))?;
        let mut headers = async_nats::HeaderMap::new();
        headers.insert("Nats-Msg-Id", event_id.to_string());

        let ack = tokio::time::timeout(self.ack_timeout, async {
            let publish = self
                .jetstream
                .publish_with_headers(subject.to_owned(), headers, bytes.into())
                .await
                .map_err(|err| BrokerError::Connection(err.to_string()))?;
            publish
                .await
                .map_err(|err| BrokerError::Rejected(err.to_string()))
        })
        .await
        .map_err(|_| BrokerError::AckTimeout)??;
        tracing::trace!(subject, %event_id, stream = %ack.stream, "event published");
        Ok(())
    }
}

impl BrokerAdmin for NatsEventBroker {
    async fn dlq_depth(&self, queue: &str) -> Result<u64, BrokerError> {
        let mut stream = self
            .jetstream
            .get_stream(format!("dlq-{queue}"))
            .await
            .map_err(|err| BrokerError::Connection(err.to_string()))?;
        let info = stream
            .info()
            .await
            .map_err(|err| BrokerError::Connection(err.to_string()))?;
        Ok(info.state.messages)
    }
}
