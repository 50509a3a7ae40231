//! Producer Session
//!
//! Single responsibility: one live connection to a broker set.
//!
//! A session can only be obtained from [`Connector::open`], which returns
//! once the brokers have been reached. Sessions do NOT reconnect; when one
//! goes bad the supervisor closes it and opens a new one.
//!
//! # Delivery errors
//!
//! `send` only reports whether the client took the record. Accepted records
//! go through the client's own batching pipeline and their outcome arrives
//! later on the session's error sequence ([`DeliveryErrors`]). The sequence
//! is unbounded so the client's delivery callback never waits on whoever
//! drains it. Records the client refuses outright are published there too,
//! except when its queue is full: that record is handed back so the caller
//! can hold it and retry.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::ProducerConfig;
use crate::error::{DeliveryError, Result};
use crate::message::Message;
use crate::resolver::BrokerSet;

/// Result of handing a record to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Queued for delivery
    Accepted,
    /// The client's local queue is full; the record is handed back untouched
    QueueFull(Message),
    /// Refused for good; already published on the error sequence
    Rejected,
}

/// An open producing session.
#[async_trait]
pub trait ProducerSession: Send + 'static {
    /// Hand a message to the session's pipeline. Returns immediately.
    fn send(&mut self, message: Message) -> SendOutcome;

    /// The session's delivery error sequence.
    ///
    /// Returns `Some` on the first call only; the sequence cannot be
    /// restarted.
    fn take_errors(&mut self) -> Option<DeliveryErrors>;

    /// Flush and release the connection. Closing twice is a no-op.
    async fn close(&mut self) -> Result<()>;
}

/// Opens producer sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: ProducerSession;

    async fn open(&self, brokers: &BrokerSet, config: &ProducerConfig) -> Result<Self::Session>;
}

/// Receiving half of a session's delivery error sequence.
#[derive(Debug)]
pub struct DeliveryErrors {
    rx: mpsc::UnboundedReceiver<DeliveryError>,
}

impl DeliveryErrors {
    /// Next delivery error, or `None` once the session has been dropped.
    pub async fn recv(&mut self) -> Option<DeliveryError> {
        self.rx.recv().await
    }

    /// Next already-buffered delivery error, without waiting.
    pub fn try_recv(&mut self) -> Option<DeliveryError> {
        self.rx.try_recv().ok()
    }
}

/// Records delivery outcomes and publishes failures.
///
/// Cheap to clone; all clones share the same consecutive-failure counter.
#[derive(Debug, Clone)]
pub struct DeliveryTracker {
    tx: mpsc::UnboundedSender<DeliveryError>,
    consecutive: Arc<AtomicU32>,
}

impl DeliveryTracker {
    /// Create a tracker and the error sequence it feeds.
    pub fn channel() -> (Self, DeliveryErrors) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                consecutive: Arc::new(AtomicU32::new(0)),
            },
            DeliveryErrors { rx },
        )
    }

    pub fn record_success(&self) {
        self.consecutive.store(0, Ordering::Relaxed);
    }

    pub fn record_failure(&self, topic: &str, reason: impl Into<String>) {
        let consecutive = self.consecutive.fetch_add(1, Ordering::Relaxed).saturating_add(1);
        // Nobody listening once the drain has been torn down
        let _ = self.tx.send(DeliveryError {
            topic: topic.to_string(),
            reason: reason.into(),
            consecutive_failures: consecutive,
        });
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failures_count_until_success() {
        let (tracker, mut errors) = DeliveryTracker::channel();

        tracker.record_failure("logs", "timed out");
        tracker.record_failure("logs", "timed out");
        tracker.record_success();
        tracker.record_failure("metrics", "leader not available");

        let counts: Vec<u32> = [
            errors.recv().await.unwrap(),
            errors.recv().await.unwrap(),
            errors.recv().await.unwrap(),
        ]
        .iter()
        .map(|e| e.consecutive_failures)
        .collect();
        assert_eq!(counts, vec![1, 2, 1]);
        assert_eq!(tracker.consecutive_failures(), 1);
    }

    #[tokio::test]
    async fn test_errors_end_when_trackers_dropped() {
        let (tracker, mut errors) = DeliveryTracker::channel();
        let clone = tracker.clone();
        drop(tracker);
        clone.record_failure("logs", "boom");
        drop(clone);

        let err = errors.recv().await.unwrap();
        assert_eq!(err.topic, "logs");
        assert_eq!(err.reason, "boom");
        assert!(errors.recv().await.is_none());
    }

    #[test]
    fn test_try_recv_returns_buffered_errors() {
        let (tracker, mut errors) = DeliveryTracker::channel();
        assert!(errors.try_recv().is_none());

        tracker.record_failure("logs", "queue full");
        tracker.record_failure("logs", "queue full");

        assert_eq!(errors.try_recv().unwrap().consecutive_failures, 1);
        assert_eq!(errors.try_recv().unwrap().consecutive_failures, 2);
        assert!(errors.try_recv().is_none());
    }
}
