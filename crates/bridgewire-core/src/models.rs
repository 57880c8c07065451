//! Payload DTOs carried inside `Packet` and `CallBack` envelopes.
//!
//! Result types default every missing field so that older services which omit
//! optional keys still decode.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ─────────────────────────────────────────────────────────────────────────────
// Players and host
// ─────────────────────────────────────────────────────────────────────────────

/// A player known to the host.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerInfo {
    /// Display name.
    pub player_name: String,
    /// Host-side unique id.
    pub player_uuid: String,
    /// Remote address.
    pub ip: String,
    /// Skin texture URL.
    pub skin_url: String,
    /// Whether the player joined from a Bedrock client.
    pub bedrock: bool,
}

impl PlayerInfo {
    /// Create a player with name and uuid only.
    #[must_use]
    pub fn new(player_name: impl Into<String>, player_uuid: impl Into<String>) -> Self {
        Self {
            player_name: player_name.into(),
            player_uuid: player_uuid.into(),
            ..Self::default()
        }
    }
}

/// A player plus the raw name the host printed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerInfoWithRaw {
    /// Player details.
    #[serde(flatten)]
    pub player: PlayerInfo,
    /// Name as it appeared in the host's chat (may carry formatting).
    pub name_raw: String,
}

/// Host description returned for `GET_SERVER_INFO`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerInfo {
    /// Host software name.
    pub server_name: String,
    /// Host software version.
    pub server_version: String,
    /// Bridge plugin version.
    pub plugin_version: String,
    /// Whether the host can run commands.
    pub is_command_supported: bool,
    /// Whether the host can resolve placeholders.
    pub is_papi_supported: bool,
    /// Whether the host accepts online-mode accounts only.
    pub is_online_mode: bool,
    /// Whether the host is itself behind a proxy.
    pub has_geyser: bool,
}

/// Chat sync settings pushed by `SYNC_SETTINGS_UPDATED`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// How chat is forwarded.
    pub sync_mode: i64,
    /// Cost charged for each forwarded message.
    pub sync_money: i64,
}

/// Kind of data point sent with `DATA_RECORD`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    /// Player joined or left.
    PlayerCount,
    /// Host performance sample.
    Performance,
    /// Arbitrary extension-defined record.
    Custom,
}

// ─────────────────────────────────────────────────────────────────────────────
// Rich chat
// ─────────────────────────────────────────────────────────────────────────────

/// Rich chat segment kind, numeric on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    /// Plain text.
    Text,
    /// Image reference.
    Image,
    /// Mention of a user.
    At,
    /// Emoji or sticker.
    Face,
    /// File attachment.
    File,
    /// Reply to a previous message.
    Reply,
}

impl SegmentKind {
    /// Numeric wire value.
    #[must_use]
    pub fn code(self) -> i64 {
        match self {
            Self::Text => 1,
            Self::Image => 2,
            Self::At => 3,
            Self::Face => 4,
            Self::File => 5,
            Self::Reply => 6,
        }
    }

    /// Parse a wire value.
    #[must_use]
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Text),
            2 => Some(Self::Image),
            3 => Some(Self::At),
            4 => Some(Self::Face),
            5 => Some(Self::File),
            6 => Some(Self::Reply),
            _ => None,
        }
    }
}

/// One segment of a rich chat message.
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    /// Segment kind.
    pub kind: SegmentKind,
    /// Text rendering of the segment.
    pub text: String,
    /// Kind-specific fields.
    pub data: Map<String, Value>,
}

impl Segment {
    /// Create a plain text segment.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: SegmentKind::Text,
            text: text.into(),
            data: Map::new(),
        }
    }

    /// Parse one segment object. Returns `None` for unknown kinds.
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let kind = SegmentKind::from_code(object.get("type")?.as_i64()?)?;
        let text = object
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        let data = object
            .iter()
            .filter(|(k, _)| k.as_str() != "type" && k.as_str() != "text")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Some(Self { kind, text, data })
    }

    /// Parse a segment array, dropping entries of unknown kind.
    #[must_use]
    pub fn parse_all(values: &[Value]) -> Vec<Self> {
        values.iter().filter_map(Self::from_json).collect()
    }

    /// Wire form.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut object = self.data.clone();
        let _ = object.insert("type".into(), Value::from(self.kind.code()));
        let _ = object.insert("text".into(), Value::from(self.text.clone()));
        Value::Object(object)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Correlated request results
// ─────────────────────────────────────────────────────────────────────────────

/// Reply to `PLAYER_JOIN`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerLoginResult {
    /// Whether the host should refuse the login.
    pub kick: bool,
    /// Message shown to the refused player.
    pub kick_message: String,
}

/// Reply to `START_BIND`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartBindResult {
    /// Code the player sends to finish binding.
    pub code: String,
    /// Human-readable expiry.
    pub time: String,
}

/// Reply to `GET_SOCIAL_ACCOUNT`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocialAccountResult {
    /// Platform the account belongs to.
    pub platform: String,
    /// Account id on that platform.
    pub uuid: String,
    /// Account display name.
    pub name: String,
    /// When the binding was made.
    pub time: String,
}

/// Reply to `GET_NEW_VERSION`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewVersionResult {
    /// Latest release version.
    pub version: String,
    /// Download page.
    pub download_url: String,
    /// Release notes.
    pub publish_log: String,
}

/// Reply to `GET_BIND_INFO`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindInfoResult {
    /// Whether the player has a bound account.
    pub is_bind: bool,
    /// Bound account id.
    pub account_id: String,
    /// Bound account display name.
    pub account_name: String,
    /// When the binding was made.
    pub bind_time: String,
}

/// Reply to `INSTALLED_PLUGIN`, keyed by plugin id.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstalledPluginsResult {
    /// Installed plugins.
    pub plugins: HashMap<String, PluginInfo>,
}

/// One plugin installed on the service.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginInfo {
    /// Whether the plugin is active.
    pub enabled: bool,
    /// Package metadata.
    pub manifest: PluginManifest,
    /// Exposed RPC methods.
    pub rpc: PluginRpcInfo,
}

/// Plugin package metadata.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginManifest {
    /// Display name.
    pub name: String,
    /// Version string.
    pub version: String,
    /// Unique id; two manifests are the same plugin when ids match.
    pub plugin_id: String,
    /// Author.
    pub author: String,
    /// Short description.
    pub description: String,
    /// Entry script.
    pub entry: String,
    /// Icon URL.
    pub icon: String,
    /// Free-form tags.
    pub tags: Vec<String>,
    /// Long description.
    pub contents: String,
    /// Related links.
    pub links: Vec<PluginLink>,
    /// Load ordering constraints.
    pub dependencies: PluginDependencies,
}

/// Named link in a plugin manifest.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginLink {
    /// Link label.
    pub name: String,
    /// Target URL.
    pub url: String,
}

/// Load ordering constraints of a plugin.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginDependencies {
    /// Plugins that must load after this one.
    pub load_before: Vec<String>,
    /// Plugins that must load before this one.
    pub load_after: Vec<String>,
    /// Hard dependencies.
    pub requires: Vec<String>,
}

/// RPC surface of a plugin.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginRpcInfo {
    /// Method names.
    pub methods: Vec<String>,
    /// Per-method descriptions.
    pub descriptions: HashMap<String, PluginRpcDescription>,
}

/// Description of one plugin RPC method.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginRpcDescription {
    /// Label shown in UIs.
    #[serde(rename = "displayName")]
    pub display_name: String,
    /// What the method does.
    pub description: String,
}
