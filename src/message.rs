//! Messages flowing into the relay and lifecycle events flowing out of it

use bytes::Bytes;
use std::fmt;

/// A record queued for delivery to a Kafka topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub payload: Bytes,
}

impl Message {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Lifecycle transitions reported to the stats sink.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    ConnectionFailed,
    SessionOpened,
    SessionClosed,
    /// Broker discovery failed for the named framework
    LookupFailed(String),
    /// A message was handed to the session for the named topic
    MessageSent(String),
}

impl LifecycleEvent {
    /// Stable stats name for this kind of event
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConnectionFailed => "kafka_connection_failed",
            Self::SessionOpened => "kafka_session_opened",
            Self::SessionClosed => "kafka_session_closed",
            Self::LookupFailed(_) => "kafka_lookup_failed",
            Self::MessageSent(_) => "kafka_message_sent",
        }
    }

    /// Framework or topic the event refers to, if any
    pub fn suffix(&self) -> Option<&str> {
        match self {
            Self::LookupFailed(framework) => Some(framework),
            Self::MessageSent(topic) => Some(topic),
            _ => None,
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.suffix() {
            Some(suffix) => write!(f, "{}.{}", self.name(), suffix),
            None => f.write_str(self.name()),
        }
    }
}
