//! Host behavior for running the agent without a game server attached.

use async_trait::async_trait;
use bridgewire_client::{BehaviorError, BehaviorResult, BridgeBehavior, ClientProfile};
use bridgewire_core::models::{PlayerInfo, Segment, ServerInfo};
use tracing::info;

/// Logs chat and announcements; has no players and runs no commands.
pub(crate) struct ConsoleBehavior {
    info: ServerInfo,
}

impl ConsoleBehavior {
    pub(crate) fn new(profile: &ClientProfile) -> Self {
        Self {
            info: ServerInfo {
                server_name: "bridgewire-agent".into(),
                server_version: env!("CARGO_PKG_VERSION").into(),
                plugin_version: profile.client_version.clone(),
                is_command_supported: false,
                is_papi_supported: false,
                ..ServerInfo::default()
            },
        }
    }
}

#[async_trait]
impl BridgeBehavior for ConsoleBehavior {
    async fn run_command(&self, _player_name: &str, command: &str, _enable_papi: bool) -> BehaviorResult<String> {
        Err(BehaviorError::new(format!("commands are not supported here: {command}")))
    }

    async fn placeholder_query(&self, _player_name: &str, text: &str) -> BehaviorResult<String> {
        Ok(text.to_string())
    }

    async fn server_info(&self) -> BehaviorResult<ServerInfo> {
        Ok(self.info.clone())
    }

    async fn broadcast_chat(&self, text: &str) -> BehaviorResult<()> {
        info!(target: "chat", "{text}");
        Ok(())
    }

    async fn broadcast_rich_chat(&self, segments: &[Segment], text: &str) -> BehaviorResult<()> {
        info!(target: "chat", segments = segments.len(), "{text}");
        Ok(())
    }

    async fn bind_success_broadcast(&self, player_name: &str, account_id: &str, account_name: &str) -> BehaviorResult<()> {
        info!(player_name, account_id, account_name, "account bound");
        Ok(())
    }

    async fn kick_player(&self, player_name: &str, message: &str) -> BehaviorResult<()> {
        info!(player_name, message, "kick requested");
        Err(BehaviorError::new(format!("player {player_name} is not online")))
    }

    async fn player_list(&self) -> BehaviorResult<Vec<PlayerInfo>> {
        Ok(Vec::new())
    }
}
