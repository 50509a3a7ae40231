//! Framework Broker Discovery
//!
//! ## Discovery Flow
//!
//! 1. SRV lookup of `_<framework>._tcp.<srv_domain>` for the scheduler port
//! 2. GET `http://<framework>.<http_domain>:<port>/v1/connection`
//! 3. Decode `{"dns": ["host:port", ...]}` from the response body
//!
//! The body is decoded into a typed struct, so any shape mismatch is a
//! parse error rather than a partially read broker list.

use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::srv::{preferred_record, SrvLookup};
use super::BrokerSet;
use crate::error::{RelayError, Result};

/// Discovery settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Domain the SRV query is made under
    pub srv_domain: String,
    /// Domain of the scheduler host; empty means the bare framework name
    pub http_domain: String,
    /// Timeout for the scheduler HTTP request
    pub timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            srv_domain: "marathon.mesos".to_string(),
            http_domain: "mesos".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Response of the scheduler's `/v1/connection` endpoint.
#[derive(Debug, Deserialize)]
struct ConnectionInfo {
    dns: Vec<String>,
}

/// SRV name queried for a framework
pub fn srv_name(framework: &str, domain: &str) -> String {
    format!("_{}._tcp.{}", framework, domain)
}

/// Scheduler connection endpoint for a framework
pub fn connection_url(framework: &str, http_domain: &str, port: u16) -> String {
    if http_domain.is_empty() {
        format!("http://{}:{}/v1/connection", framework, port)
    } else {
        format!("http://{}.{}:{}/v1/connection", framework, http_domain, port)
    }
}

/// Decode the broker list out of a scheduler response body.
pub fn extract_brokers(framework: &str, body: &[u8]) -> Result<Vec<String>> {
    let info: ConnectionInfo =
        serde_json::from_slice(body).map_err(|e| RelayError::parse(framework, e))?;
    if let Some(pos) = info.dns.iter().position(|b| b.is_empty()) {
        return Err(RelayError::parse(
            framework,
            format!("dns entry {} is empty", pos),
        ));
    }
    Ok(info.dns)
}

/// Looks up brokers through a framework scheduler.
pub struct FrameworkDiscovery {
    config: DiscoveryConfig,
    srv: Arc<dyn SrvLookup>,
    http: reqwest::Client,
}

impl FrameworkDiscovery {
    pub fn new(config: DiscoveryConfig, srv: Arc<dyn SrvLookup>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RelayError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { config, srv, http })
    }

    /// Resolve the scheduler endpoint for a framework.
    pub async fn connection_endpoint(&self, framework: &str) -> Result<String> {
        let name = srv_name(framework, &self.config.srv_domain);
        let records = self.srv.lookup_srv(&name).await.map_err(|e| {
            RelayError::lookup(framework, format!("SRV lookup of {} failed: {}", name, e))
        })?;

        let record = preferred_record(&records).ok_or_else(|| {
            RelayError::lookup(framework, format!("No SRV records for {}", name))
        })?;

        let url = connection_url(framework, &self.config.http_domain, record.port);
        info!(framework, %url, "Fetching broker list from Kafka framework");
        Ok(url)
    }

    /// Fetch and decode the broker list from a scheduler endpoint.
    pub async fn fetch_brokers(&self, framework: &str, url: &str) -> Result<BrokerSet> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| RelayError::lookup(framework, format!("GET {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::lookup(
                framework,
                format!("GET {} returned {}", url, status),
            ));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| RelayError::lookup(framework, format!("Reading {} failed: {}", url, e)))?;

        let brokers = extract_brokers(framework, &body)?;
        debug!(framework, count = brokers.len(), "Decoded broker list");

        // Entries are known non-empty here, so only an empty list fails
        BrokerSet::new(brokers).map_err(|_| {
            RelayError::lookup(framework, "framework reported no brokers")
        })
    }

    /// Full discovery: SRV lookup, scheduler query, body decode.
    pub async fn lookup_brokers(&self, framework: &str) -> Result<BrokerSet> {
        let url = self.connection_endpoint(framework).await?;
        self.fetch_brokers(framework, &url).await
    }
}
