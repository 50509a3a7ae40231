//! Configuration for kafka-relay
//!
//! CLI arguments and environment variable handling using clap. Arguments
//! are parsed once at startup and turned into immutable snapshots
//! ([`ProducerConfig`], [`SupervisorConfig`], [`DiscoveryConfig`]) that are
//! handed to the components by value.

use clap::Parser;
use std::time::Duration;

use crate::error::{RelayError, Result};
use crate::resolver::{BrokerSet, BrokerSource, DiscoveryConfig};

/// Largest `linger.ms` librdkafka accepts
pub const MAX_FLUSH_MS: u64 = 900_000;

/// kafka-relay - forwards newline-delimited records from stdin into Kafka
#[derive(Parser, Debug, Clone)]
#[command(name = "kafka-relay")]
#[command(about = "Resilient Kafka producer relay with framework broker discovery")]
pub struct Args {
    /// The Kafka brokers to connect to, as a comma separated list
    /// (overrides --kafka-framework)
    #[arg(long, env = "KAFKA_BROKERS", default_value = "")]
    pub kafka_brokers: String,

    /// The Kafka framework to query for brokers
    #[arg(long, env = "KAFKA_FRAMEWORK", default_value = "kafka")]
    pub kafka_framework: String,

    /// Number of milliseconds to wait between output flushes
    #[arg(long, env = "KAFKA_FLUSH_MS", default_value = "5000")]
    pub kafka_flush_ms: u64,

    /// Milliseconds to wait before reconnecting after a failure
    /// (defaults to --kafka-flush-ms)
    #[arg(long, env = "KAFKA_RETRY_MS")]
    pub kafka_retry_ms: Option<u64>,

    /// Enables Snappy compression on outgoing Kafka data
    #[arg(long, env = "KAFKA_COMPRESS_SNAPPY", default_value_t = true, action = clap::ArgAction::Set)]
    pub kafka_compress_snappy: bool,

    /// Requires that outgoing data be committed by all Kafka replicas (true)
    /// rather than committed by just one replica (false)
    #[arg(long, env = "KAFKA_REQUIRE_ALL_ACKS", default_value = "false")]
    pub kafka_require_all_acks: bool,

    /// Enable extra logging in the underlying Kafka client
    #[arg(long, env = "KAFKA_VERBOSE", default_value = "false")]
    pub kafka_verbose: bool,

    /// Consecutive delivery failures after which the session is reopened
    /// (unset = never)
    #[arg(long, env = "KAFKA_FAILURE_THRESHOLD")]
    pub kafka_failure_threshold: Option<u32>,

    /// DNS domain for the framework SRV query
    #[arg(long, env = "KAFKA_SRV_DOMAIN", default_value = "marathon.mesos")]
    pub srv_domain: String,

    /// DNS domain of the framework scheduler host (empty = bare framework name)
    #[arg(long, env = "KAFKA_HTTP_DOMAIN", default_value = "mesos")]
    pub http_domain: String,

    /// Timeout for the scheduler connection request in milliseconds
    #[arg(long, env = "KAFKA_DISCOVERY_TIMEOUT_MS", default_value = "10000")]
    pub discovery_timeout_ms: u64,

    /// Topic that records read from stdin are sent to
    #[arg(long, env = "RELAY_TOPIC", default_value = "relay")]
    pub topic: String,

    /// Number of records buffered between stdin and the producer
    #[arg(long, env = "RELAY_QUEUE_CAPACITY", default_value = "1024")]
    pub queue_capacity: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,
}

/// Acknowledgment mode for produced records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acks {
    /// Committed by the partition leader only
    Leader,
    /// Committed by all in-sync replicas
    All,
}

impl Acks {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Leader => "1",
            Self::All => "all",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Snappy,
}

impl Compression {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Snappy => "snappy",
        }
    }
}

/// Settings applied to every producer session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerConfig {
    pub acks: Acks,
    pub compression: Compression,
    /// Maximum time records are buffered before being sent as a batch
    pub flush_interval: Duration,
    /// Forward the client's internal diagnostics to the log
    pub verbose: bool,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            acks: Acks::Leader,
            compression: Compression::Snappy,
            flush_interval: Duration::from_millis(5000),
            verbose: false,
        }
    }
}

/// Settings for the reconnect loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Delay between a failure and the next resolution attempt.
    ///
    /// Defaults to the producer flush interval.
    pub retry_delay: Duration,
    /// Consecutive delivery failures after which the session is torn down
    /// and reopened. `None` keeps a session open regardless of delivery
    /// errors.
    pub failure_threshold: Option<u32>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            retry_delay: ProducerConfig::default().flush_interval,
            failure_threshold: None,
        }
    }
}

impl Args {
    /// Producer settings snapshot
    pub fn producer_config(&self) -> ProducerConfig {
        ProducerConfig {
            acks: if self.kafka_require_all_acks {
                Acks::All
            } else {
                Acks::Leader
            },
            compression: if self.kafka_compress_snappy {
                Compression::Snappy
            } else {
                Compression::None
            },
            flush_interval: Duration::from_millis(self.kafka_flush_ms),
            verbose: self.kafka_verbose,
        }
    }

    /// Reconnect loop settings snapshot
    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            retry_delay: Duration::from_millis(self.kafka_retry_ms.unwrap_or(self.kafka_flush_ms)),
            failure_threshold: self.kafka_failure_threshold,
        }
    }

    /// Discovery settings snapshot
    pub fn discovery_config(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            srv_domain: self.srv_domain.clone(),
            http_domain: self.http_domain.clone(),
            timeout: Duration::from_millis(self.discovery_timeout_ms),
        }
    }

    /// Decide where brokers come from.
    ///
    /// A static list wins over framework discovery. Returns a configuration
    /// error if the static list contains an empty entry or if neither
    /// source is configured.
    pub fn broker_source(&self) -> Result<BrokerSource> {
        if !self.kafka_brokers.is_empty() {
            let brokers = BrokerSet::parse_list(&self.kafka_brokers)?;
            Ok(BrokerSource::Static(brokers))
        } else if !self.kafka_framework.is_empty() {
            Ok(BrokerSource::Framework(self.kafka_framework.clone()))
        } else {
            Err(RelayError::Config(
                "Either --kafka-framework or --kafka-brokers must be specified".to_string(),
            ))
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.broker_source()?;

        if self.kafka_flush_ms == 0 {
            return Err(RelayError::Config(
                "KAFKA_FLUSH_MS must be greater than zero".to_string(),
            ));
        }

        if self.kafka_flush_ms > MAX_FLUSH_MS {
            return Err(RelayError::Config(format!(
                "KAFKA_FLUSH_MS must be at most {} (librdkafka linger.ms limit), got {}",
                MAX_FLUSH_MS, self.kafka_flush_ms
            )));
        }

        if self.kafka_failure_threshold == Some(0) {
            return Err(RelayError::Config(
                "KAFKA_FAILURE_THRESHOLD must be at least 1".to_string(),
            ));
        }

        if self.queue_capacity == 0 {
            return Err(RelayError::Config(
                "RELAY_QUEUE_CAPACITY must be greater than zero".to_string(),
            ));
        }

        if self.topic.is_empty() {
            return Err(RelayError::Config("RELAY_TOPIC must not be empty".to_string()));
        }

        Ok(())
    }
}
