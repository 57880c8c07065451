//! Extension identity.
//!
//! An extension is a pluggable unit that registers event handlers and/or RPC
//! methods. Its identity is always supplied by the registering party; the
//! client never generates one.

use serde::{Deserialize, Serialize};

/// Identity metadata of an extension.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtensionInfo {
    /// Stable unique id, e.g. `"bridge:test"`.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Short description.
    #[serde(default)]
    pub description: String,
    /// Author.
    #[serde(default)]
    pub author: String,
    /// Version string.
    #[serde(default)]
    pub version: String,
    /// Ids of extensions this one depends on.
    #[serde(default)]
    pub required_extensions: Vec<String>,
}

impl ExtensionInfo {
    /// Create an identity with the given id and name.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            author: String::new(),
            version: String::new(),
            required_extensions: Vec::new(),
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the author.
    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Set the version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Add a required extension id.
    #[must_use]
    pub fn requires(mut self, extension_id: impl Into<String>) -> Self {
        self.required_extensions.push(extension_id.into());
        self
    }
}
