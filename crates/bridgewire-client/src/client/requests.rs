//! Outbound named operations.

use bridgewire_core::models::{
    BindInfoResult, InstalledPluginsResult, NewVersionResult, PlayerInfo, PlayerInfoWithRaw, PlayerLoginResult,
    RecordType, SocialAccountResult, StartBindResult,
};
use bridgewire_core::protocol::operations::outbound;
use bridgewire_core::{BridgeError, Envelope, ProtocolError, Result};
use bridgewire_rpc::RpcReply;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::BridgeClient;

/// Capability flag gating [`BridgeClient::get_installed_plugins`].
const SUPPORT_PLUGIN_LIST: &str = "support_get_plugin_list";

impl BridgeClient {
    async fn call_typed<T: DeserializeOwned>(&self, envelope: Envelope) -> Result<T> {
        let reply = self.request(envelope).await?;
        Ok(reply.payload_as()?)
    }

    // ── Correlated ──────────────────────────────────────────────────────────

    /// Ask whether `player` may join.
    pub async fn login(&self, player: &PlayerInfo) -> Result<PlayerLoginResult> {
        let player_info = serde_json::to_value(player).map_err(ProtocolError::from)?;
        self.call_typed(Envelope::packet(outbound::PLAYER_JOIN).with_field("player_info", player_info))
            .await
    }

    /// Start binding an external account to `player_name`.
    pub async fn start_bind(&self, player_name: &str) -> Result<StartBindResult> {
        self.call_typed(Envelope::packet(outbound::START_BIND).with_field("player_name", player_name))
            .await
    }

    /// Look up the social account bound to `player_name`.
    pub async fn get_social_account(&self, player_name: &str) -> Result<SocialAccountResult> {
        self.call_typed(Envelope::packet(outbound::GET_SOCIAL_ACCOUNT).with_field("player_name", player_name))
            .await
    }

    /// Binding details for `player_name`.
    pub async fn get_bind_info(&self, player_name: &str) -> Result<BindInfoResult> {
        self.call_typed(Envelope::packet(outbound::GET_BIND_INFO).with_field("player_name", player_name))
            .await
    }

    /// Latest released client version.
    pub async fn get_new_version(&self) -> Result<NewVersionResult> {
        self.call_typed(Envelope::packet(outbound::GET_NEW_VERSION)).await
    }

    /// Plugins installed on the service.
    ///
    /// Fails with [`BridgeError::Unsupported`] unless the service advertised
    /// `support_get_plugin_list` during identify.
    pub async fn get_installed_plugins(&self) -> Result<InstalledPluginsResult> {
        let supported = self
            .identify_success()
            .is_some_and(|identify| identify.supports(SUPPORT_PLUGIN_LIST));
        if !supported {
            return Err(BridgeError::Unsupported(outbound::INSTALLED_PLUGIN.to_string()));
        }
        self.call_typed(Envelope::packet(outbound::INSTALLED_PLUGIN)).await
    }

    /// Call `method` on a remote extension.
    ///
    /// An `{error: true}` reply becomes [`BridgeError::Remote`].
    pub async fn rpc_call(&self, extension_id: &str, method: &str, body: Value) -> Result<Value> {
        let envelope = Envelope::packet(outbound::RPC_CALL)
            .with_field("identifier", extension_id)
            .with_field("method", method)
            .with_field("body", body);
        let reply: RpcReply = self.call_typed(envelope).await?;
        if reply.error {
            return Err(BridgeError::Remote {
                message: reply.error_message,
            });
        }
        Ok(reply.result)
    }

    // ── Notifications ───────────────────────────────────────────────────────

    /// Report a player to the service.
    pub fn report_player(&self, player_name: &str, player_uuid: &str, player_ip: &str) -> Result<()> {
        self.send(
            Envelope::notification(outbound::REPORT_PLAYER)
                .with_field("player_name", player_name)
                .with_field("player_uuid", player_uuid)
                .with_field("player_ip", player_ip),
        )
    }

    /// Announce the host's online players, typically on start and stop.
    ///
    /// `players` goes on the wire as a single string, formatted by the host.
    pub fn server_state(&self, players: &str) -> Result<()> {
        self.send(
            Envelope::notification(outbound::SERVER_STATE_CHANGED)
                .with_field("token", self.settings().connection.token.as_str())
                .with_field("players", players),
        )
    }

    /// Record a data point.
    pub fn data_record(&self, record_type: RecordType, data: Value, name: &str) -> Result<()> {
        let record_type = serde_json::to_value(record_type).map_err(ProtocolError::from)?;
        self.send(
            Envelope::notification(outbound::DATA_RECORD)
                .with_field("type", record_type)
                .with_field("data", data)
                .with_field("name", name)
                .with_field("token", self.settings().connection.token.as_str()),
        )
    }

    /// Forward a chat message.
    pub fn sync_message(&self, player: &PlayerInfoWithRaw, message: &str, use_command: bool) -> Result<()> {
        let player = serde_json::to_value(player).map_err(ProtocolError::from)?;
        self.send(
            Envelope::notification(outbound::SYNC_MESSAGE)
                .with_field("player", player)
                .with_field("message", message)
                .with_field("use_command", use_command),
        )
    }

    /// Forward a death message. `killer` is the killer's display name, empty
    /// for non-player deaths.
    pub fn sync_death_message(&self, player: &PlayerInfoWithRaw, raw: &str, killer: &str) -> Result<()> {
        let player = serde_json::to_value(player).map_err(ProtocolError::from)?;
        self.send(
            Envelope::notification(outbound::SYNC_DEATH_MESSAGE)
                .with_field("player", player)
                .with_field("raw", raw)
                .with_field("killer", killer),
        )
    }

    /// Forward a join (`enter`) or leave.
    pub fn sync_enter_exit(&self, player: &PlayerInfoWithRaw, enter: bool) -> Result<()> {
        let player = serde_json::to_value(player).map_err(ProtocolError::from)?;
        self.send(
            Envelope::notification(outbound::SYNC_ENTER_EXIT)
                .with_field("player", player)
                .with_field("enter", enter),
        )
    }

    /// Ask the service to push its chat sync settings again.
    pub fn request_sync_settings(&self) -> Result<()> {
        self.send(Envelope::notification(outbound::NEED_SYNC_SETTINGS))
    }
}
