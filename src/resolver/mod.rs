//! Broker Resolution
//!
//! Produces the list of Kafka brokers a producer session connects to.
//!
//! | Module      | Responsibility                                   |
//! |-------------|--------------------------------------------------|
//! | `srv`       | DNS SRV lookup of the framework scheduler port   |
//! | `discovery` | Scheduler HTTP query and strict body decoding    |
//!
//! Brokers come either from a static list given at startup or from the
//! framework scheduler. Every call to [`ResolveBrokers::resolve`] starts
//! from scratch, so a framework that restarted between attempts is picked up
//! on the next retry and stale addresses are never reused.

pub mod discovery;
pub mod srv;

use async_trait::async_trait;
use std::fmt;

pub use discovery::{connection_url, extract_brokers, DiscoveryConfig, FrameworkDiscovery};
pub use srv::{HickorySrvLookup, SrvLookup, SrvRecord};

use crate::error::{RelayError, Result};

/// A validated, non-empty, ordered list of `host:port` broker addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerSet(Vec<String>);

impl BrokerSet {
    /// Build a set from addresses, rejecting an empty list or empty entries.
    pub fn new(brokers: Vec<String>) -> std::result::Result<Self, String> {
        if brokers.is_empty() {
            return Err("broker list is empty".to_string());
        }
        if let Some(pos) = brokers.iter().position(|b| b.is_empty()) {
            return Err(format!("broker entry {} is empty", pos));
        }
        Ok(Self(brokers))
    }

    /// Parse a comma separated static broker list.
    pub fn parse_list(list: &str) -> Result<Self> {
        let brokers = list.split(',').map(|s| s.trim().to_string()).collect();
        Self::new(brokers).map_err(|e| {
            RelayError::Config(format!("--kafka-brokers '{}' is invalid: {}", list, e))
        })
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Comma joined form used for client bootstrap configuration
    pub fn join(&self) -> String {
        self.0.join(",")
    }
}

impl fmt::Display for BrokerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(", "))
    }
}

/// Where brokers are obtained from, decided once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerSource {
    Static(BrokerSet),
    /// Name of the framework whose scheduler lists the brokers
    Framework(String),
}

/// Anything that can produce a fresh broker set.
#[async_trait]
pub trait ResolveBrokers: Send + Sync {
    async fn resolve(&self) -> Result<BrokerSet>;
}

/// Resolves brokers from a static list or through framework discovery.
pub enum BrokerResolver {
    Static(BrokerSet),
    Framework {
        name: String,
        discovery: FrameworkDiscovery,
    },
}

impl BrokerResolver {
    pub fn framework(name: impl Into<String>, discovery: FrameworkDiscovery) -> Self {
        Self::Framework {
            name: name.into(),
            discovery,
        }
    }

    /// Framework name, if brokers are discovered
    pub fn framework_name(&self) -> Option<&str> {
        match self {
            Self::Static(_) => None,
            Self::Framework { name, .. } => Some(name),
        }
    }
}

#[async_trait]
impl ResolveBrokers for BrokerResolver {
    async fn resolve(&self) -> Result<BrokerSet> {
        match self {
            Self::Static(brokers) => Ok(brokers.clone()),
            Self::Framework { name, discovery } => discovery.lookup_brokers(name).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_keeps_order() {
        let brokers = BrokerSet::parse_list("b:2,a:1,c:3").unwrap();
        assert_eq!(brokers.as_slice(), ["b:2", "a:1", "c:3"]);
        assert_eq!(brokers.join(), "b:2,a:1,c:3");
        assert_eq!(brokers.to_string(), "b:2, a:1, c:3");
    }

    #[test]
    fn test_parse_list_single() {
        let brokers = BrokerSet::parse_list("localhost:9092").unwrap();
        assert_eq!(brokers.len(), 1);
    }

    #[test]
    fn test_parse_list_trims_whitespace() {
        let brokers = BrokerSet::parse_list("a:1, b:2").unwrap();
        assert_eq!(brokers.as_slice(), ["a:1", "b:2"]);
    }

    #[test]
    fn test_parse_list_rejects_empty_tokens() {
        for bad in ["a:1,", ",a:1", "a:1,,b:2", ",", " "] {
            let err = BrokerSet::parse_list(bad).unwrap_err();
            assert!(matches!(err, RelayError::Config(_)), "{bad:?} gave {err:?}");
        }
    }

    #[test]
    fn test_new_rejects_empty_set() {
        assert!(BrokerSet::new(vec![]).is_err());
    }

    #[tokio::test]
    async fn test_static_resolver_returns_list_every_time() {
        let brokers = BrokerSet::parse_list("a:1,b:2").unwrap();
        let resolver = BrokerResolver::Static(brokers.clone());
        assert_eq!(resolver.framework_name(), None);
        assert_eq!(resolver.resolve().await.unwrap(), brokers);
        assert_eq!(resolver.resolve().await.unwrap(), brokers);
    }
}
