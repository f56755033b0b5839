use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::node::LifecycleState;

/// Transport failures, split by how the readiness loop treats them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    ConnectionRefused,
    ConnectionReset,
    BrokenPipe,
    UnexpectedEof,
    Other,
}

impl TransportErrorKind {
    /// Kinds seen while the daemon is still booting.
    pub fn is_transient(self) -> bool {
        !matches!(self, TransportErrorKind::Other)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransportErrorKind::ConnectionRefused => "connection refused",
            TransportErrorKind::ConnectionReset => "connection reset",
            TransportErrorKind::BrokenPipe => "broken pipe",
            TransportErrorKind::UnexpectedEof => "premature end of response",
            TransportErrorKind::Other => "transport failure",
        }
    }
}

impl From<std::io::ErrorKind> for TransportErrorKind {
    fn from(kind: std::io::ErrorKind) -> Self {
        match kind {
            std::io::ErrorKind::ConnectionRefused => TransportErrorKind::ConnectionRefused,
            std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::ConnectionAborted => {
                TransportErrorKind::ConnectionReset
            }
            std::io::ErrorKind::BrokenPipe => TransportErrorKind::BrokenPipe,
            std::io::ErrorKind::UnexpectedEof => TransportErrorKind::UnexpectedEof,
            _ => TransportErrorKind::Other,
        }
    }
}

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Invalid configuration: {message}")]
    Configuration { message: String },

    #[error("Container engine failed to {operation}: {message}")]
    Environment {
        operation: &'static str,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error(
        "Unable to get ports for container {container}. Usually this means the daemon process failed to start"
    )]
    PortsUnavailable { container: String },

    #[error("RPC transport error ({}) at {endpoint}: {message}", kind.as_str())]
    Transport {
        kind: TransportErrorKind,
        endpoint: String,
        message: String,
    },

    #[error("RPC error: {error}")]
    Rpc { error: Value },

    #[error("Container {container} is {actual}; {operation} requires {expected}")]
    State {
        container: String,
        operation: &'static str,
        expected: &'static str,
        actual: LifecycleState,
    },

    #[error("Expectation not met: {message}")]
    Expectation { message: String },

    #[error("Timed out after {}ms", elapsed.as_millis())]
    Timeout { elapsed: Duration },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HarnessError {
    pub fn configuration(message: impl Into<String>) -> Self {
        HarnessError::Configuration {
            message: message.into(),
        }
    }

    pub fn expectation(message: impl Into<String>) -> Self {
        HarnessError::Expectation {
            message: message.into(),
        }
    }

    pub fn environment<E>(operation: &'static str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        HarnessError::Environment {
            operation,
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Connection-level failures that clear up once the daemon listens.
    pub fn is_transient_transport(&self) -> bool {
        matches!(self, HarnessError::Transport { kind, .. } if kind.is_transient())
    }

    /// "Not yet" failures for scenario polling: the condition may still
    /// become true on a later attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            HarnessError::Expectation { .. } | HarnessError::Rpc { .. } => true,
            other => other.is_transient_transport(),
        }
    }

    /// The daemon's raw error payload, for RPC rejections.
    pub fn rpc_payload(&self) -> Option<&Value> {
        match self {
            HarnessError::Rpc { error } => Some(error),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;
