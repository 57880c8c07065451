//! RPC method trait, request type and the remote-call seam.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::RpcError;

/// Correlated calls back to the remote side, available to handlers.
///
/// A handler may issue nested calls over the same connection before it
/// produces its own result.
#[async_trait]
pub trait RemoteRpc: Send + Sync {
    /// Invoke `method` of remote extension `extension_id`.
    async fn call(&self, extension_id: &str, method: &str, body: Value) -> Result<Value, RpcError>;
}

/// Remote side that is never reachable.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoRemote;

#[async_trait]
impl RemoteRpc for NoRemote {
    async fn call(&self, extension_id: &str, method: &str, _body: Value) -> Result<Value, RpcError> {
        Err(RpcError::Remote(format!(
            "no remote connection for {extension_id}.{method}"
        )))
    }
}

/// Immutable input of one RPC invocation.
#[derive(Clone)]
pub struct RpcRequest {
    /// Target extension id.
    pub extension_id: String,
    /// Target method name.
    pub method: String,
    /// Call arguments.
    pub body: Value,
    /// Remote side for nested calls.
    pub remote: Arc<dyn RemoteRpc>,
}

impl RpcRequest {
    /// Create a request.
    #[must_use]
    pub fn new(
        extension_id: impl Into<String>,
        method: impl Into<String>,
        body: Value,
        remote: Arc<dyn RemoteRpc>,
    ) -> Self {
        Self {
            extension_id: extension_id.into(),
            method: method.into(),
            body,
            remote,
        }
    }

    /// Create a request with no remote side.
    #[must_use]
    pub fn local(extension_id: impl Into<String>, method: impl Into<String>, body: Value) -> Self {
        Self::new(extension_id, method, body, Arc::new(NoRemote))
    }

    /// Decode the body into typed arguments.
    pub fn args<T: DeserializeOwned>(&self) -> Result<T, RpcError> {
        Ok(serde_json::from_value(self.body.clone())?)
    }

    /// Nested call with typed arguments and result.
    pub async fn call_remote<A, R>(&self, extension_id: &str, method: &str, args: &A) -> Result<R, RpcError>
    where
        A: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let body = serde_json::to_value(args)?;
        let value = self.remote.call(extension_id, method, body).await?;
        Ok(serde_json::from_value(value)?)
    }
}

impl fmt::Debug for RpcRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcRequest")
            .field("extension_id", &self.extension_id)
            .field("method", &self.method)
            .field("body", &self.body)
            .finish_non_exhaustive()
    }
}

/// Trait implemented by every RPC method.
#[async_trait]
pub trait RpcMethod: Send + Sync {
    /// Execute the method.
    async fn call(&self, request: RpcRequest) -> Result<Value, RpcError>;
}

/// Display metadata of a registered method.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MethodInfo {
    /// What the method does.
    pub description: String,
    /// Label shown in UIs.
    pub display_name: String,
}

impl MethodInfo {
    /// Create metadata.
    #[must_use]
    pub fn new(display_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            display_name: display_name.into(),
        }
    }
}

type BoxedFn = Box<dyn Fn(RpcRequest) -> BoxFuture<'static, Result<Value, RpcError>> + Send + Sync>;

/// [`RpcMethod`] backed by an async closure. Built with [`rpc_fn`].
pub struct FnMethod {
    f: BoxedFn,
}

#[async_trait]
impl RpcMethod for FnMethod {
    async fn call(&self, request: RpcRequest) -> Result<Value, RpcError> {
        (self.f)(request).await
    }
}

/// Wrap an async closure as an [`RpcMethod`].
pub fn rpc_fn<F, Fut>(f: F) -> FnMethod
where
    F: Fn(RpcRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, RpcError>> + Send + 'static,
{
    FnMethod {
        f: Box::new(move |request| Box::pin(f(request))),
    }
}
