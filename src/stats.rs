//! Logging stats sink
//!
//! Consumes lifecycle events, logs them, and keeps per-event counts that
//! are reported when the relay shuts down.

use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::message::LifecycleEvent;

/// Event counts keyed by `name[.suffix]`
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StatsSummary {
    pub counts: BTreeMap<String, u64>,
}

impl StatsSummary {
    pub fn record(&mut self, event: &LifecycleEvent) {
        *self.counts.entry(event.to_string()).or_insert(0) += 1;
    }

    pub fn get(&self, key: &str) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }
}

/// Spawn a task that drains lifecycle events until every sender is gone.
pub fn spawn_stats_logger(mut events: mpsc::Receiver<LifecycleEvent>) -> JoinHandle<StatsSummary> {
    tokio::spawn(async move {
        let mut summary = StatsSummary::default();
        while let Some(event) = events.recv().await {
            match &event {
                LifecycleEvent::MessageSent(topic) => debug!(topic = %topic, "Message sent"),
                LifecycleEvent::SessionOpened => info!("Kafka session opened"),
                LifecycleEvent::SessionClosed => info!("Kafka session closed"),
                LifecycleEvent::ConnectionFailed => warn!("Kafka connection failed"),
                LifecycleEvent::LookupFailed(framework) => {
                    warn!(framework = %framework, "Kafka broker lookup failed")
                }
            }
            summary.record(&event);
        }
        summary
    })
}
