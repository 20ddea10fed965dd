//! Error types for the event hub.

use crate::types::SubscriptionId;
use std::fmt;
use thiserror::Error;

/// Main error type for hub operations.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown publication mode: {0}")]
    UnknownPublicationMode(String),

    #[error("Main-thread publication requested but no main context is configured")]
    NoMainContext,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{} handler(s) failed for {event_type}", .failures.len())]
    Delivery {
        event_type: String,
        failures: Vec<DeliveryFailure>,
    },

    #[error("Execution context has shut down")]
    ExecutorShutdown,

    #[error("Main loop can only be run on the thread that created it")]
    ForeignThread,
}

/// A single handler or predicate failure observed while delivering an event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryFailure {
    pub subscription: SubscriptionId,
    pub message: String,
}

impl fmt::Display for DeliveryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.subscription, self.message)
    }
}

impl HubError {
    /// Failures carried by a [`HubError::Delivery`], empty for any other variant.
    pub fn failures(&self) -> &[DeliveryFailure] {
        match self {
            HubError::Delivery { failures, .. } => failures,
            _ => &[],
        }
    }
}

/// Result type for hub operations.
pub type Result<T> = std::result::Result<T, HubError>;
