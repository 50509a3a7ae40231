//! Error types for kafka-relay

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    /// Invalid or missing configuration. Never retried.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Broker discovery against a framework failed
    #[error("Broker lookup against framework {framework} failed: {reason}")]
    Lookup { framework: String, reason: String },

    /// The framework answered with a body we could not decode
    #[error("Malformed broker list from framework {framework}: {reason}")]
    Parse { framework: String, reason: String },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Close error: {0}")]
    Close(String),
}

impl RelayError {
    pub fn lookup(framework: &str, reason: impl ToString) -> Self {
        Self::Lookup {
            framework: framework.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn parse(framework: &str, reason: impl ToString) -> Self {
        Self::Parse {
            framework: framework.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Returns true if the supervisor should absorb this error and retry.
    ///
    /// Only configuration errors are permanent: a bad broker list or a
    /// missing discovery target cannot heal between attempts.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Config(_))
    }

    /// Framework name for discovery failures.
    pub fn framework(&self) -> Option<&str> {
        match self {
            Self::Lookup { framework, .. } | Self::Parse { framework, .. } => Some(framework),
            _ => None,
        }
    }
}

/// A single record the broker client failed to deliver.
///
/// Delivery errors never terminate a session on their own.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to deliver message to topic {topic}: {reason}")]
pub struct DeliveryError {
    pub topic: String,
    pub reason: String,
    /// Failures seen on the session since its last successful delivery,
    /// including this one.
    pub consecutive_failures: u32,
}

pub type Result<T> = std::result::Result<T, RelayError>;
