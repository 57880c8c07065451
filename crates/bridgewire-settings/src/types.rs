//! Settings types with compiled defaults.
//!
//! Every struct uses `#[serde(default)]` so a partial settings file only needs
//! the keys it overrides.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeSettings {
    /// Connection target and timing.
    pub connection: ConnectionSettings,
    /// Values reported to the service during identify.
    pub profile: ProfileSettings,
    /// Worker pool sizes.
    pub workers: WorkerSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl BridgeSettings {
    /// Delay before a reconnect attempt.
    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.connection.reconnect_delay_secs)
    }

    /// Default deadline of a correlated call.
    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.connection.call_timeout_secs)
    }

    /// Check values that would make the client unusable.
    pub fn validate(&self) -> Result<()> {
        if self.connection.url.trim().is_empty() {
            return Err(SettingsError::InvalidValue("connection.url is empty".into()));
        }
        if !self.connection.url.starts_with("ws://") && !self.connection.url.starts_with("wss://") {
            return Err(SettingsError::InvalidValue(format!(
                "connection.url must be a ws:// or wss:// URL, got '{}'",
                self.connection.url
            )));
        }
        if self.connection.call_timeout_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "connection.callTimeoutSecs must be positive".into(),
            ));
        }
        if self.workers.rpc_workers == 0 || self.workers.event_workers == 0 {
            return Err(SettingsError::InvalidValue(
                "worker pool sizes must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Connection target and timing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionSettings {
    /// WebSocket URL of the service.
    pub url: String,
    /// Access token sent in `Identify`.
    pub token: String,
    /// Seconds to wait before reconnecting.
    pub reconnect_delay_secs: u64,
    /// Seconds to wait for a `CallBack`.
    pub call_timeout_secs: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:26990/bridge".to_string(),
            token: String::new(),
            reconnect_delay_secs: 5,
            call_timeout_secs: 5,
        }
    }
}

/// Values reported during identify and flags describing the host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileSettings {
    /// Client software version.
    pub client_version: String,
    /// Free-form host description.
    pub server_description: String,
    /// Whether the host can run commands.
    pub command_supported: bool,
    /// Whether the host can resolve placeholders.
    pub papi_supported: bool,
    /// Verbose packet logging.
    pub debug: bool,
}

impl Default for ProfileSettings {
    fn default() -> Self {
        Self {
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            server_description: String::new(),
            command_supported: false,
            papi_supported: false,
            debug: false,
        }
    }
}

/// Worker pool sizes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkerSettings {
    /// Concurrent inbound RPC calls.
    pub rpc_workers: usize,
    /// Concurrent asynchronous event publications.
    pub event_workers: usize,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            rpc_workers: 16,
            event_workers: 64,
        }
    }
}

/// Log output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
