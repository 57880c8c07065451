//! RPC error types.

use thiserror::Error;

/// Errors produced while routing or executing an RPC method.
///
/// The router never panics or propagates a handler panic; every failure is
/// one of these values, which the client turns into an
/// `{error: true, error_message}` reply.
#[derive(Debug, Error)]
pub enum RpcError {
    /// No extension is registered under the id.
    #[error("extension '{0}' is not registered")]
    ExtensionNotFound(String),

    /// The extension exists but does not expose the method.
    #[error("method '{method}' not found on extension '{extension}'")]
    MethodNotFound {
        /// Extension id.
        extension: String,
        /// Requested method.
        method: String,
    },

    /// The request body did not match what the method expects.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// The handler reported a failure.
    #[error("{0}")]
    Handler(String),

    /// The handler panicked.
    #[error("method '{method}' on extension '{extension}' panicked: {message}")]
    Panicked {
        /// Extension id.
        extension: String,
        /// Method name.
        method: String,
        /// Panic message.
        message: String,
    },

    /// A nested call to the remote side failed.
    #[error("remote call failed: {0}")]
    Remote(String),

    /// The executor was shut down before the call ran.
    #[error("rpc call cancelled")]
    Cancelled,
}

impl RpcError {
    /// Create a handler error.
    #[must_use]
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler(message.into())
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidArguments(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn not_found_messages_identify_the_target() {
        assert_eq!(
            RpcError::ExtensionNotFound("bridge:x".into()).to_string(),
            "extension 'bridge:x' is not registered"
        );
        let err = RpcError::MethodNotFound {
            extension: "bridge:x".into(),
            method: "ping".into(),
        };
        assert_eq!(err.to_string(), "method 'ping' not found on extension 'bridge:x'");
    }

    #[test]
    fn json_errors_are_invalid_arguments() {
        let json_err = serde_json::from_str::<u32>("\"x\"").unwrap_err();
        assert_matches!(RpcError::from(json_err), RpcError::InvalidArguments(_));
    }
}
