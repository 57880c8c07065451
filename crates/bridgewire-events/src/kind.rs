//! Event kinds and handler priorities.

use std::fmt;
use std::str::FromStr;

use crate::errors::EventError;

/// Closed set of event kinds a handler can subscribe to.
///
/// `Lifecycle` and `RawPacket` are broad kinds: a handler subscribed to one
/// also receives every narrower kind that declares it (see
/// [`EventKind::matches`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// Any connection lifecycle change.
    Lifecycle,
    /// The socket opened.
    Connected,
    /// The socket closed or failed.
    Disconnected,
    /// The handshake completed.
    Online,
    /// Any inbound envelope, before internal processing.
    RawPacket,
    /// An inbound `Packet` about to be executed, with its reply skeleton.
    ExecPacket,
    /// An outbound envelope about to be written.
    SendPacket,
}

impl EventKind {
    /// Every kind.
    pub const ALL: [Self; 7] = [
        Self::Lifecycle,
        Self::Connected,
        Self::Disconnected,
        Self::Online,
        Self::RawPacket,
        Self::ExecPacket,
        Self::SendPacket,
    ];

    /// The kind itself followed by the broader kind it belongs to.
    #[must_use]
    pub fn matches(self) -> &'static [Self] {
        match self {
            Self::Lifecycle => &[Self::Lifecycle],
            Self::Connected => &[Self::Connected, Self::Lifecycle],
            Self::Disconnected => &[Self::Disconnected, Self::Lifecycle],
            Self::Online => &[Self::Online, Self::Lifecycle],
            Self::RawPacket => &[Self::RawPacket],
            Self::ExecPacket => &[Self::ExecPacket, Self::RawPacket],
            Self::SendPacket => &[Self::SendPacket],
        }
    }

    /// Canonical name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lifecycle => "Lifecycle",
            Self::Connected => "Connected",
            Self::Disconnected => "Disconnected",
            Self::Online => "Online",
            Self::RawPacket => "RawPacket",
            Self::ExecPacket => "ExecPacket",
            Self::SendPacket => "SendPacket",
        }
    }

    /// Parse a kind name, ignoring case, `_` and `-`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().to_lowercase() == normalized)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| EventError::UnknownKind(s.to_string()))
    }
}

/// Handler priority. Higher priorities run first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Priority {
    /// Runs last.
    Lowest,
    /// Below normal.
    Low,
    /// Between low and normal.
    Medium,
    /// Default.
    #[default]
    Normal,
    /// Above normal.
    High,
    /// Runs first.
    Highest,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Lowest => "lowest",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Highest => "highest",
        };
        f.write_str(name)
    }
}
