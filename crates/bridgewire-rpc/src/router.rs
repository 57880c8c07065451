//! RPC registry and router.
//!
//! Methods are keyed by `(extension id, method name)`. Registering the same
//! key again replaces the previous handler.

use std::collections::BTreeMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bridgewire_core::ExtensionInfo;
use dashmap::DashMap;
use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::RpcError;
use crate::method::{MethodInfo, RpcMethod, RpcRequest};

struct Registered {
    info: MethodInfo,
    handler: Arc<dyn RpcMethod>,
}

/// Descriptor of one method, as reported to the remote side.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MethodDescriptor {
    /// Owning extension id.
    pub identifier: String,
    /// Method name.
    pub method: String,
    /// What the method does.
    pub description: String,
    /// Label shown in UIs.
    #[serde(rename = "displayName")]
    pub display_name: String,
}

/// An extension and the methods it exposes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionCapabilities {
    /// Identity.
    pub info: ExtensionInfo,
    /// Methods sorted by name.
    pub methods: Vec<MethodDescriptor>,
}

/// Registry mapping `(extension, method)` to handlers.
#[derive(Default)]
pub struct RpcRouter {
    extensions: DashMap<String, ExtensionInfo>,
    methods: DashMap<(String, String), Arc<Registered>>,
}

impl RpcRouter {
    /// Create an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` as `method` of `extension`.
    ///
    /// Rejects (with a warning) an empty method name or extension id and
    /// returns `false`. An existing registration under the same key is
    /// replaced.
    pub fn register(
        &self,
        extension: &ExtensionInfo,
        method: &str,
        info: MethodInfo,
        handler: impl RpcMethod + 'static,
    ) -> bool {
        self.register_arc(extension, method, info, Arc::new(handler))
    }

    /// Register a shared handler. See [`RpcRouter::register`].
    pub fn register_arc(
        &self,
        extension: &ExtensionInfo,
        method: &str,
        info: MethodInfo,
        handler: Arc<dyn RpcMethod>,
    ) -> bool {
        if extension.id.trim().is_empty() {
            warn!(method, "skipping rpc method with empty extension id");
            return false;
        }
        if method.trim().is_empty() {
            warn!(extension = %extension.id, "skipping rpc method with empty name");
            return false;
        }

        let _ = self
            .extensions
            .insert(extension.id.clone(), extension.clone());
        let key = (extension.id.clone(), method.to_string());
        let previous = self.methods.insert(key, Arc::new(Registered { info, handler }));
        if previous.is_some() {
            debug!(extension = %extension.id, method, "replacing rpc method");
        } else {
            debug!(extension = %extension.id, method, "registered rpc method");
        }
        true
    }

    /// Remove an extension and all its methods. Returns the number of methods removed.
    pub fn unregister(&self, extension_id: &str) -> usize {
        let _ = self.extensions.remove(extension_id);
        let before = self.methods.len();
        self.methods.retain(|(ext, _), _| ext != extension_id);
        let removed = before.saturating_sub(self.methods.len());
        debug!(extension = %extension_id, removed, "unregistered rpc extension");
        removed
    }

    /// Route and execute a call.
    ///
    /// Never panics: handler panics become [`RpcError::Panicked`].
    pub async fn call(&self, request: RpcRequest) -> Result<Value, RpcError> {
        let extension = request.extension_id.clone();
        let method = request.method.clone();

        if !self.extensions.contains_key(&extension) {
            return Err(RpcError::ExtensionNotFound(extension));
        }
        let registered = self
            .methods
            .get(&(extension.clone(), method.clone()))
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| RpcError::MethodNotFound {
                extension: extension.clone(),
                method: method.clone(),
            })?;

        debug!(extension = %extension, method = %method, "invoking rpc method");
        match AssertUnwindSafe(registered.handler.call(request))
            .catch_unwind()
            .await
        {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                warn!(extension = %extension, method = %method, error = %e, "rpc method failed");
                Err(e)
            }
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(ToString::to_string)
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                warn!(extension = %extension, method = %method, panic = %message, "rpc method panicked");
                Err(RpcError::Panicked {
                    extension,
                    method,
                    message,
                })
            }
        }
    }

    /// Every extension with its methods, sorted by extension id.
    #[must_use]
    pub fn list_capabilities(&self) -> Vec<ExtensionCapabilities> {
        let mut by_extension: BTreeMap<String, ExtensionCapabilities> = self
            .extensions
            .iter()
            .map(|entry| {
                (
                    entry.key().clone(),
                    ExtensionCapabilities {
                        info: entry.value().clone(),
                        methods: Vec::new(),
                    },
                )
            })
            .collect();

        for entry in &self.methods {
            let (ext, method) = entry.key();
            if let Some(caps) = by_extension.get_mut(ext) {
                caps.methods.push(MethodDescriptor {
                    identifier: ext.clone(),
                    method: method.clone(),
                    description: entry.value().info.description.clone(),
                    display_name: entry.value().info.display_name.clone(),
                });
            }
        }

        let mut out: Vec<_> = by_extension.into_values().collect();
        for caps in &mut out {
            caps.methods.sort_by(|a, b| a.method.cmp(&b.method));
        }
        out
    }

    /// Whether a method is registered.
    #[must_use]
    pub fn has_method(&self, extension_id: &str, method: &str) -> bool {
        self.methods
            .contains_key(&(extension_id.to_string(), method.to_string()))
    }

    /// Ids of every registered extension, sorted.
    #[must_use]
    pub fn extension_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.extensions.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Number of registered methods.
    #[must_use]
    pub fn method_count(&self) -> usize {
        self.methods.len()
    }
}

impl fmt::Debug for RpcRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcRouter")
            .field("extensions", &self.extensions.len())
            .field("methods", &self.methods.len())
            .finish()
    }
}
