//! # bridgewire-settings
//!
//! Layered configuration for the bridge client.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`BridgeSettings::default()`]
//! 2. **Settings file**: `~/.bridgewire/settings.json` or an explicit path,
//!    deep-merged over defaults
//! 3. **Environment variables**: `BRIDGEWIRE_*` overrides

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, deep_merge, load_settings, load_settings_from_path, settings_path,
};
pub use types::{
    BridgeSettings, ConnectionSettings, LoggingSettings, ProfileSettings, WorkerSettings,
};
