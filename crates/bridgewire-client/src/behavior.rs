//! Host-side actions the service can request.

use async_trait::async_trait;
use bridgewire_core::models::{PlayerInfo, Segment, ServerInfo};
use thiserror::Error;

/// Failure reported by a [`BridgeBehavior`] action.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct BehaviorError(pub String);

impl BehaviorError {
    /// Create an error from a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<String> for BehaviorError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for BehaviorError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

/// Result of a behavior action.
pub type BehaviorResult<T> = Result<T, BehaviorError>;

/// Host integration invoked by inbound named operations.
///
/// Implementations must be cheap to call from the inbound path; long-running
/// work should be handed off and acknowledged.
///
/// Every method is awaited on the connection's reader task, so no further
/// frames are read until it returns. A method must not await a correlated
/// call on the same client (such as [`BridgeClient::login`]): its reply
/// cannot arrive and the call ends in [`BridgeError::Timeout`]. Spawn such
/// calls instead. RPC methods run on their own executor and are not
/// affected.
///
/// [`BridgeClient::login`]: crate::BridgeClient::login
/// [`BridgeError::Timeout`]: bridgewire_core::BridgeError::Timeout
#[async_trait]
pub trait BridgeBehavior: Send + Sync {
    /// Run a console command, optionally as `player_name` with placeholder
    /// expansion. Returns the command output.
    async fn run_command(&self, player_name: &str, command: &str, enable_papi: bool) -> BehaviorResult<String>;

    /// Expand placeholders in `text` for `player_name`.
    async fn placeholder_query(&self, player_name: &str, text: &str) -> BehaviorResult<String>;

    /// Describe the host.
    async fn server_info(&self) -> BehaviorResult<ServerInfo>;

    /// Broadcast plain chat.
    async fn broadcast_chat(&self, text: &str) -> BehaviorResult<()>;

    /// Broadcast rich chat. `text` is the plain fallback.
    async fn broadcast_rich_chat(&self, segments: &[Segment], text: &str) -> BehaviorResult<()>;

    /// Announce that `player_name` bound an external account.
    async fn bind_success_broadcast(&self, player_name: &str, account_id: &str, account_name: &str) -> BehaviorResult<()>;

    /// Disconnect a player with a message.
    async fn kick_player(&self, player_name: &str, message: &str) -> BehaviorResult<()>;

    /// Players currently online.
    async fn player_list(&self) -> BehaviorResult<Vec<PlayerInfo>>;
}
