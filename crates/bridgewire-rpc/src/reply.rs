//! Wire shape of RPC results.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::RpcError;

/// `{error, error_message, result}` carried by an RPC `CallBack`.
///
/// Used both for replies the client sends and for replies it receives to its
/// own outbound calls.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcReply {
    /// Whether the call failed.
    pub error: bool,
    /// Failure message, empty on success.
    pub error_message: String,
    /// Method result.
    pub result: Value,
}

impl RpcReply {
    /// Successful reply.
    #[must_use]
    pub fn ok(result: Value) -> Self {
        Self {
            error: false,
            error_message: String::new(),
            result,
        }
    }

    /// Failed reply.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: true,
            error_message: message.into(),
            result: Value::Null,
        }
    }

    /// Convert a call outcome.
    #[must_use]
    pub fn from_result(result: Result<Value, RpcError>) -> Self {
        match result {
            Ok(value) => Self::ok(value),
            Err(e) => Self::failed(e.to_string()),
        }
    }

    /// Convert back into a call outcome.
    pub fn into_result(self) -> Result<Value, RpcError> {
        if self.error {
            Err(RpcError::Remote(self.error_message))
        } else {
            Ok(self.result)
        }
    }
}
