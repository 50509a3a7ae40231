//! rdkafka-backed producer sessions
//!
//! Uses a `ThreadedProducer`, which batches records for up to the flush
//! interval and polls delivery reports on its own thread. The custom
//! context feeds those reports into the session's [`DeliveryTracker`] and
//! routes librdkafka's log lines into `tracing`.

use async_trait::async_trait;
use rdkafka::client::ClientContext;
use rdkafka::config::{ClientConfig, RDKafkaLogLevel};
use rdkafka::error::KafkaError;
use rdkafka::message::{DeliveryResult, Message as _};
use rdkafka::producer::{BaseRecord, Producer, ProducerContext, ThreadedProducer};
use rdkafka::types::RDKafkaErrorCode;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::session::{Connector, DeliveryErrors, DeliveryTracker, ProducerSession, SendOutcome};
use crate::config::ProducerConfig;
use crate::error::{RelayError, Result};
use crate::message::Message;
use crate::resolver::BrokerSet;

/// Default time allowed for the initial metadata request
const DEFAULT_METADATA_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time allowed to flush outstanding records on close
const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(30);

/// librdkafka debug contexts enabled in verbose mode
const VERBOSE_DEBUG_CONTEXTS: &str = "broker,topic,msg";

/// Client context shared with the rdkafka polling thread
struct RelayContext {
    deliveries: DeliveryTracker,
}

impl ClientContext for RelayContext {
    fn log(&self, level: RDKafkaLogLevel, fac: &str, log_message: &str) {
        match level {
            RDKafkaLogLevel::Emerg
            | RDKafkaLogLevel::Alert
            | RDKafkaLogLevel::Critical
            | RDKafkaLogLevel::Error => error!(target: "rdkafka", facility = fac, "{}", log_message),
            RDKafkaLogLevel::Warning => warn!(target: "rdkafka", facility = fac, "{}", log_message),
            RDKafkaLogLevel::Notice | RDKafkaLogLevel::Info => {
                info!(target: "rdkafka", facility = fac, "{}", log_message)
            }
            RDKafkaLogLevel::Debug => debug!(target: "rdkafka", facility = fac, "{}", log_message),
        }
    }

    fn error(&self, error: KafkaError, reason: &str) {
        warn!(target: "rdkafka", error = %error, "{}", reason);
    }
}

impl ProducerContext for RelayContext {
    type DeliveryOpaque = ();

    fn delivery(&self, result: &DeliveryResult<'_>, _: Self::DeliveryOpaque) {
        match result {
            Ok(_) => self.deliveries.record_success(),
            Err((e, msg)) => self.deliveries.record_failure(msg.topic(), e.to_string()),
        }
    }
}

/// True when librdkafka refused a record only because its local queue is full
fn is_queue_full(err: &KafkaError) -> bool {
    matches!(
        err,
        KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull)
    )
}

/// Build the librdkafka configuration for a session.
pub fn client_config(brokers: &BrokerSet, config: &ProducerConfig) -> ClientConfig {
    let mut client = ClientConfig::new();
    client
        .set("bootstrap.servers", brokers.join())
        .set("acks", config.acks.as_str())
        .set("compression.type", config.compression.as_str())
        .set("linger.ms", config.flush_interval.as_millis().to_string());

    if config.verbose {
        client
            .set("debug", VERBOSE_DEBUG_CONTEXTS)
            .set_log_level(RDKafkaLogLevel::Debug);
    }

    client
}

/// Opens rdkafka producer sessions.
#[derive(Debug, Clone)]
pub struct KafkaConnector {
    metadata_timeout: Duration,
    close_timeout: Duration,
}

impl Default for KafkaConnector {
    fn default() -> Self {
        Self {
            metadata_timeout: DEFAULT_METADATA_TIMEOUT,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }
}

impl KafkaConnector {
    pub fn with_timeouts(metadata_timeout: Duration, close_timeout: Duration) -> Self {
        Self {
            metadata_timeout,
            close_timeout,
        }
    }
}

#[async_trait]
impl Connector for KafkaConnector {
    type Session = KafkaSession;

    /// Create the producer and confirm the brokers answer a metadata request.
    async fn open(&self, brokers: &BrokerSet, config: &ProducerConfig) -> Result<KafkaSession> {
        let (deliveries, errors) = DeliveryTracker::channel();
        let client = client_config(brokers, config);
        let context = RelayContext {
            deliveries: deliveries.clone(),
        };
        let timeout = self.metadata_timeout;
        let broker_list = brokers.to_string();

        // Metadata fetch and producer teardown both block
        let producer = tokio::task::spawn_blocking(move || -> Result<ThreadedProducer<RelayContext>> {
            let producer: ThreadedProducer<RelayContext> =
                client.create_with_context(context).map_err(|e| {
                    RelayError::Connection(format!(
                        "Producer creation against brokers [{}] failed: {}",
                        broker_list, e
                    ))
                })?;

            let metadata = producer.client().fetch_metadata(None, timeout).map_err(|e| {
                RelayError::Connection(format!(
                    "Brokers [{}] did not answer metadata request: {}",
                    broker_list, e
                ))
            })?;
            debug!(brokers = metadata.brokers().len(), "Cluster metadata received");

            Ok(producer)
        })
        .await
        .map_err(|e| RelayError::Connection(format!("Producer setup task failed: {}", e)))??;

        info!(
            brokers = %brokers,
            acks = config.acks.as_str(),
            compression = config.compression.as_str(),
            "Kafka producer session opened"
        );

        Ok(KafkaSession {
            producer: Some(producer),
            deliveries,
            errors: Some(errors),
            close_timeout: self.close_timeout,
        })
    }
}

/// A producer session on an rdkafka `ThreadedProducer`.
pub struct KafkaSession {
    producer: Option<ThreadedProducer<RelayContext>>,
    deliveries: DeliveryTracker,
    errors: Option<DeliveryErrors>,
    close_timeout: Duration,
}

#[async_trait]
impl ProducerSession for KafkaSession {
    fn send(&mut self, message: Message) -> SendOutcome {
        let Some(producer) = &self.producer else {
            self.deliveries.record_failure(&message.topic, "session is closed");
            return SendOutcome::Rejected;
        };

        let record = BaseRecord::<(), [u8]>::to(&message.topic).payload(&message.payload[..]);
        let err = match producer.send(record) {
            Ok(()) => return SendOutcome::Accepted,
            Err((e, _)) => e,
        };

        if is_queue_full(&err) {
            return SendOutcome::QueueFull(message);
        }
        self.deliveries.record_failure(&message.topic, err.to_string());
        SendOutcome::Rejected
    }

    fn take_errors(&mut self) -> Option<DeliveryErrors> {
        self.errors.take()
    }

    async fn close(&mut self) -> Result<()> {
        let Some(producer) = self.producer.take() else {
            return Ok(());
        };
        let timeout = self.close_timeout;

        tokio::task::spawn_blocking(move || {
            let flushed = producer.flush(timeout);
            drop(producer);
            flushed
        })
        .await
        .map_err(|e| RelayError::Close(format!("Producer shutdown task failed: {}", e)))?
        .map_err(|e| RelayError::Close(format!("Failed to flush producer: {}", e)))
    }
}
