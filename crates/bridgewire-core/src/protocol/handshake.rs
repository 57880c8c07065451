//! Handshake packets exchanged before a connection becomes ready.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lowest heartbeat interval the client will use, in seconds.
pub const MIN_HEARTBEAT_INTERVAL_SECS: u64 = 10;

/// Margin subtracted from the server's advertised interval, in seconds.
const HEARTBEAT_MARGIN_SECS: u64 = 10;

/// `Hello` payload sent by the server when the socket opens.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HelloPacket {
    /// Host operating system of the service.
    pub system_name: String,
    /// Runtime version of the service.
    #[serde(alias = "dotnet_version")]
    pub runtime_version: String,
    /// Service version.
    #[serde(alias = "version")]
    pub app_version: String,
    /// Session identifier assigned by the service.
    pub session_id: String,
    /// Advertised heartbeat interval in seconds.
    pub interval: u64,
}

impl HelloPacket {
    /// Heartbeat interval the client should use for this session.
    #[must_use]
    pub fn heartbeat_interval(&self) -> u64 {
        negotiated_heartbeat_interval(self.interval)
    }
}

/// `Identify` payload sent by the client in response to `Hello`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentifyPacket {
    /// Access token.
    pub token: String,
    /// Client software version.
    pub client_version: String,
    /// Free-form host description.
    pub description: String,
}

/// `IdentifySuccess` payload closing the handshake.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentifySuccessPacket {
    /// Name the service assigned to this host.
    pub server_name: String,
    /// Whether the service answers `INSTALLED_PLUGIN` requests.
    pub support_get_plugin_list: bool,
    /// Any further capability flags.
    #[serde(flatten)]
    pub capabilities: Map<String, Value>,
}

impl IdentifySuccessPacket {
    /// Look up a boolean capability flag, including the typed ones.
    #[must_use]
    pub fn supports(&self, flag: &str) -> bool {
        if flag == "support_get_plugin_list" {
            return self.support_get_plugin_list;
        }
        self.capabilities
            .get(flag)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Heartbeat interval for an advertised `Hello.interval`.
///
/// Beats are sent `10` seconds ahead of the advertised interval, never more
/// often than every `10` seconds.
#[must_use]
pub fn negotiated_heartbeat_interval(interval: u64) -> u64 {
    interval
        .saturating_sub(HEARTBEAT_MARGIN_SECS)
        .max(MIN_HEARTBEAT_INTERVAL_SECS)
}
