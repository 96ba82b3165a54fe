//! Event bus publisher
//!
//! Emits report lifecycle events to the platform message bus. Every message
//! is wrapped in the platform envelope (name, version, flow id, payload,
//! metadata) so downstream consumers can route without parsing payloads.

use anyhow::{Context, Result};
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::KafkaConfig;

/// Topic carrying report lifecycle events
pub const REPORTS_TOPIC: &str = "siem-reports";

/// Envelope version understood by platform consumers
const ENVELOPE_VERSION: &str = "1.0";

#[derive(Clone)]
pub struct EventPublisher {
    producer: FutureProducer,
    timeout: Duration,
}

impl EventPublisher {
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &config.brokers)
            .set("message.timeout.ms", config.message_timeout_ms.to_string());

        if let Some(sasl) = &config.sasl {
            client_config
                .set("security.protocol", "SASL_SSL")
                .set("sasl.mechanisms", "PLAIN")
                .set("sasl.username", &sasl.username)
                .set("sasl.password", &sasl.password);
        }

        let producer: FutureProducer = client_config
            .create()
            .context("Failed to create Kafka producer")?;

        Ok(Self {
            producer,
            timeout: Duration::from_millis(config.message_timeout_ms),
        })
    }

    /// Publish an event wrapped in the platform envelope. Delivery failures
    /// are logged and swallowed so the bus being down never fails a request.
    pub async fn publish<T: Serialize>(&self, name: &str, tenant_code: &str, payload: &T) {
        let flow_id = Uuid::new_v4().to_string();
        let envelope = json!({
            "name": name,
            "version": ENVELOPE_VERSION,
            "flow_id": flow_id,
            "payload": payload,
            "metadata": {
                "tenant": tenant_code,
                "emitted_at": chrono::Utc::now().to_rfc3339(),
            },
        });

        let body = match serde_json::to_string(&envelope) {
            Ok(body) => body,
            Err(e) => {
                warn!(event = name, "Failed to serialize event: {}", e);
                return;
            }
        };

        let record = FutureRecord::to(REPORTS_TOPIC)
            .key(tenant_code)
            .payload(&body);

        match self
            .producer
            .send(record, Timeout::After(self.timeout))
            .await
        {
            Ok((partition, offset)) => {
                debug!(
                    event = name,
                    flow_id = %flow_id,
                    partition,
                    offset,
                    "Event published"
                );
            }
            Err((e, _)) => {
                warn!(event = name, flow_id = %flow_id, "Failed to publish event: {}", e);
            }
        }
    }
}
