//! Kafka Producer Module
//!
//! | Module       | Responsibility                                     |
//! |--------------|----------------------------------------------------|
//! | `session`    | Session and connector traits, delivery errors      |
//! | `kafka`      | rdkafka-backed sessions                            |
//! | `supervisor` | Resolve/connect/produce/retry state machine        |
//!
//! # Usage
//!
//! ```ignore
//! use kafka_relay::producer::{KafkaConnector, ProducerSupervisor};
//!
//! let supervisor = ProducerSupervisor::new(
//!     resolver,
//!     KafkaConnector::default(),
//!     producer_config,
//!     supervisor_config,
//!     stats_tx,
//! );
//! supervisor.run(messages_rx, shutdown.clone()).await?;
//! ```

pub mod kafka;
pub mod session;
pub mod supervisor;

pub use kafka::{client_config, KafkaConnector, KafkaSession};
pub use session::{Connector, DeliveryErrors, DeliveryTracker, ProducerSession, SendOutcome};
pub use supervisor::ProducerSupervisor;
