//! Named `Packet` operations.

/// Operations the service sends to the client. Each one expects a `CallBack`.
pub mod inbound {
    /// Query host name, versions and online counts.
    pub const GET_SERVER_INFO: &str = "GET_SERVER_INFO";
    /// A player's account was unbound; kick them.
    pub const UN_BIND_NOTIFY: &str = "UN_BIND_NOTIFY";
    /// A player finished binding; announce it.
    pub const BIND_SUCCESS_NOTIFY: &str = "BIND_SUCCESS_NOTIFY";
    /// Resolve placeholder text for a player.
    pub const PLACEHOLDER_API_QUERY: &str = "PLACEHOLDER_API_QUERY";
    /// Run a console command.
    pub const RUN_COMMAND: &str = "RUN_COMMAND";
    /// Broadcast chat, plain or rich.
    pub const SEND_TO_CHAT: &str = "SEND_TO_CHAT";
    /// Chat sync settings changed.
    pub const SYNC_SETTINGS_UPDATED: &str = "SYNC_SETTINGS_UPDATED";
    /// List online players.
    pub const PLAYER_LIST: &str = "PLAYER_LIST";
    /// Invoke an extension RPC method.
    pub const RPC_CALL: &str = "RPC_CALL";
    /// Describe installed extensions and their RPC methods.
    pub const GET_EXTENSIONS: &str = "GET_EXTENSIONS";

    /// Every inbound operation name.
    pub const ALL: &[&str] = &[
        GET_SERVER_INFO,
        UN_BIND_NOTIFY,
        BIND_SUCCESS_NOTIFY,
        PLACEHOLDER_API_QUERY,
        RUN_COMMAND,
        SEND_TO_CHAT,
        SYNC_SETTINGS_UPDATED,
        PLAYER_LIST,
        RPC_CALL,
        GET_EXTENSIONS,
    ];
}

/// Operations the client sends to the service.
pub mod outbound {
    /// Player login check (correlated).
    pub const PLAYER_JOIN: &str = "PLAYER_JOIN";
    /// Start account binding (correlated).
    pub const START_BIND: &str = "START_BIND";
    /// Look up a player's social account (correlated).
    pub const GET_SOCIAL_ACCOUNT: &str = "GET_SOCIAL_ACCOUNT";
    /// Latest client release (correlated).
    pub const GET_NEW_VERSION: &str = "GET_NEW_VERSION";
    /// Binding details for a player (correlated).
    pub const GET_BIND_INFO: &str = "GET_BIND_INFO";
    /// Plugins installed on the service (correlated).
    pub const INSTALLED_PLUGIN: &str = "INSTALLED_PLUGIN";
    /// Call a remote RPC method (correlated).
    pub const RPC_CALL: &str = "RPC_CALL";
    /// Report a player.
    pub const REPORT_PLAYER: &str = "REPORT_PLAYER";
    /// Host started or stopped.
    pub const SERVER_STATE_CHANGED: &str = "SERVER_STATE_CHANGED";
    /// Record a data point.
    pub const DATA_RECORD: &str = "DATA_RECORD";
    /// Forward a chat message.
    pub const SYNC_MESSAGE: &str = "SYNC_MESSAGE";
    /// Forward a death message.
    pub const SYNC_DEATH_MESSAGE: &str = "SYNC_DEATH_MESSAGE";
    /// Forward a join or leave.
    pub const SYNC_ENTER_EXIT: &str = "SYNC_ENTER_EXIT";
    /// Ask the service to push `SYNC_SETTINGS_UPDATED`.
    pub const NEED_SYNC_SETTINGS: &str = "NEED_SYNC_SETTINGS";
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn inbound_names_are_distinct() {
        let set: HashSet<_> = inbound::ALL.iter().collect();
        assert_eq!(set.len(), inbound::ALL.len());
    }

    #[test]
    fn rpc_call_shares_a_name_in_both_directions() {
        assert_eq!(inbound::RPC_CALL, outbound::RPC_CALL);
    }
}
