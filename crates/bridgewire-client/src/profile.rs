//! Runtime profile reported during identify and updated by the service.

use bridgewire_core::models::SyncSettings;
use bridgewire_core::protocol::IdentifyPacket;
use bridgewire_settings::ProfileSettings;

/// Values describing this client to the service.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientProfile {
    /// Client software version.
    pub client_version: String,
    /// Free-form host description.
    pub server_description: String,
    /// Whether the host can run commands.
    pub command_supported: bool,
    /// Whether the host can resolve placeholders.
    pub papi_supported: bool,
    /// Log every inbound frame.
    pub debug: bool,
    /// Chat sync settings last pushed by the service.
    pub sync: SyncSettings,
}

impl ClientProfile {
    /// `Identify` payload for `token`.
    #[must_use]
    pub fn identify(&self, token: &str) -> IdentifyPacket {
        IdentifyPacket {
            token: token.to_string(),
            client_version: self.client_version.clone(),
            description: self.server_description.clone(),
        }
    }
}

impl From<&ProfileSettings> for ClientProfile {
    fn from(settings: &ProfileSettings) -> Self {
        Self {
            client_version: settings.client_version.clone(),
            server_description: settings.server_description.clone(),
            command_supported: settings.command_supported,
            papi_supported: settings.papi_supported,
            debug: settings.debug,
            sync: SyncSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identify_uses_profile_values() {
        let settings = ProfileSettings {
            client_version: "1.2.3".into(),
            server_description: "survival".into(),
            ..ProfileSettings::default()
        };
        let profile = ClientProfile::from(&settings);
        let identify = profile.identify("secret");
        assert_eq!(identify.token, "secret");
        assert_eq!(identify.client_version, "1.2.3");
        assert_eq!(identify.description, "survival");
        assert_eq!(profile.sync, SyncSettings::default());
    }
}
