//! DNS SRV lookup
//!
//! Finds the port a framework scheduler listens on by querying
//! `_<framework>._tcp.<domain>`.

use async_trait::async_trait;
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::TokioAsyncResolver;
use std::cmp::Reverse;
use tracing::debug;

use crate::error::{RelayError, Result};

/// One SRV answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrvRecord {
    pub target: String,
    pub port: u16,
    pub priority: u16,
    pub weight: u16,
}

/// SRV query capability.
///
/// An empty answer is `Ok(vec![])`; `Err` carries the resolver's reason.
#[async_trait]
pub trait SrvLookup: Send + Sync {
    async fn lookup_srv(&self, name: &str) -> std::result::Result<Vec<SrvRecord>, String>;
}

/// Pick the record to use: lowest priority first, then highest weight.
pub fn preferred_record(records: &[SrvRecord]) -> Option<&SrvRecord> {
    records.iter().min_by_key(|r| (r.priority, Reverse(r.weight)))
}

/// SRV lookup backed by the system resolver configuration.
pub struct HickorySrvLookup {
    resolver: TokioAsyncResolver,
}

impl HickorySrvLookup {
    pub fn from_system_conf() -> Result<Self> {
        let resolver = TokioAsyncResolver::tokio_from_system_conf().map_err(|e| {
            RelayError::Config(format!("Failed to load system DNS configuration: {}", e))
        })?;
        Ok(Self { resolver })
    }
}

#[async_trait]
impl SrvLookup for HickorySrvLookup {
    async fn lookup_srv(&self, name: &str) -> std::result::Result<Vec<SrvRecord>, String> {
        match self.resolver.srv_lookup(name).await {
            Ok(lookup) => {
                let records: Vec<SrvRecord> = lookup
                    .iter()
                    .map(|srv| SrvRecord {
                        target: srv.target().to_utf8(),
                        port: srv.port(),
                        priority: srv.priority(),
                        weight: srv.weight(),
                    })
                    .collect();
                debug!(name, count = records.len(), "SRV lookup answered");
                Ok(records)
            }
            Err(e) if matches!(e.kind(), ResolveErrorKind::NoRecordsFound { .. }) => Ok(Vec::new()),
            Err(e) => Err(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(port: u16, priority: u16, weight: u16) -> SrvRecord {
        SrvRecord {
            target: "scheduler.marathon.mesos.".to_string(),
            port,
            priority,
            weight,
        }
    }

    #[test]
    fn test_preferred_record_lowest_priority() {
        let records = vec![record(1, 10, 5), record(2, 0, 1), record(3, 5, 100)];
        assert_eq!(preferred_record(&records).unwrap().port, 2);
    }

    #[test]
    fn test_preferred_record_weight_breaks_ties() {
        let records = vec![record(1, 0, 5), record(2, 0, 50)];
        assert_eq!(preferred_record(&records).unwrap().port, 2);
    }

    #[test]
    fn test_preferred_record_empty() {
        assert!(preferred_record(&[]).is_none());
    }
}
