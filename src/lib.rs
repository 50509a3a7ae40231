//! kafka-relay - resilient Kafka producer relay
//!
//! Streams messages from an in-process queue into a Kafka cluster. Broker
//! outages and lost connections never stop callers from enqueueing: the
//! supervisor keeps rediscovering brokers and reopening its producer
//! session until it is told to stop.
//!
//! ## Components
//!
//! - **Resolver**: static broker list or framework discovery (DNS SRV +
//!   scheduler `/v1/connection`)
//! - **Producer**: rdkafka sessions and the reconnecting supervisor
//! - **Stats**: lifecycle events for telemetry
//! - **Input**: newline-delimited stdin records for the binary

pub mod config;
pub mod error;
pub mod input;
pub mod message;
pub mod producer;
pub mod resolver;
pub mod stats;

pub use config::{Acks, Args, Compression, ProducerConfig, SupervisorConfig};
pub use error::{DeliveryError, RelayError, Result};
pub use message::{LifecycleEvent, Message};
pub use producer::{KafkaConnector, ProducerSupervisor};
pub use resolver::{BrokerResolver, BrokerSet, BrokerSource, ResolveBrokers};
