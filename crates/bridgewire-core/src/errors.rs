//! Error hierarchy for the bridge client.
//!
//! Failures are grouped by how the client reacts to them:
//!
//! - [`TransportError`]: the socket could not be opened or written. Triggers
//!   reconnect scheduling and never reaches unrelated callers.
//! - [`ProtocolError`]: an inbound message could not be understood. The
//!   message is logged and dropped; the connection stays up.
//! - [`BridgeError`]: top-level error surfaced to callers of the public API.
//!   Timeouts and shutdown cancellation only ever reach the caller that owns
//!   the affected call.

use thiserror::Error;

/// Socket-level failure.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Opening the connection failed.
    #[error("failed to connect to {url}: {message}")]
    Connect {
        /// Target URL.
        url: String,
        /// Underlying failure.
        message: String,
    },

    /// Writing a frame failed.
    #[error("failed to send frame: {0}")]
    Send(String),

    /// Reading from the socket failed.
    #[error("failed to receive frame: {0}")]
    Receive(String),

    /// The socket is closed.
    #[error("connection closed")]
    Closed,
}

/// Malformed inbound data.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The text was not valid JSON or did not match the expected shape.
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A required field was absent.
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    /// The `op` value is not a known opcode.
    #[error("unknown opcode {0}")]
    UnknownOpCode(u64),
}

/// Top-level error returned by the bridge client API.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Socket failure.
    #[error("{0}")]
    Transport(#[from] TransportError),

    /// Inbound data could not be decoded.
    #[error("{0}")]
    Protocol(#[from] ProtocolError),

    /// No `CallBack` arrived before the deadline.
    #[error("timed out after {timeout_ms}ms waiting for reply {callback_id}")]
    Timeout {
        /// Correlation id of the call.
        callback_id: String,
        /// Configured timeout in milliseconds.
        timeout_ms: u64,
    },

    /// A named operation failed while being executed locally.
    #[error("operation '{operation}' failed: {message}")]
    Operation {
        /// Operation name.
        operation: String,
        /// Failure description.
        message: String,
    },

    /// The remote side answered a call with an error.
    #[error("remote error: {message}")]
    Remote {
        /// Message supplied by the remote side.
        message: String,
    },

    /// The remote side does not support the requested feature.
    #[error("unsupported by server: {0}")]
    Unsupported(String),

    /// The client has been shut down.
    #[error("bridge client is shutting down")]
    Shutdown,
}

impl BridgeError {
    /// Create an operation error.
    #[must_use]
    pub fn operation(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Operation {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Whether the failure is resolved by reconnecting.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Whether this error is the shutdown cancellation.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::Shutdown)
    }

    /// Whether this error is a reply deadline expiry.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Result type for bridge client operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
