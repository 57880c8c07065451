//! # bridgewire-rpc
//!
//! Registry and router through which extensions expose callable methods.
//!
//! - [`RpcRouter`] maps `(extension id, method)` to an [`RpcMethod`] and never
//!   panics when routing or executing
//! - [`RpcRequest`] is immutable; a method returns `Result<Value, RpcError>`
//!   and may call back into the remote side through [`RemoteRpc`]
//! - [`RpcExecutor`] caps how many inbound calls run at once
//! - [`RpcReply`] is the `{error, error_message, result}` wire shape

#![deny(unsafe_code)]

pub mod errors;
pub mod executor;
pub mod method;
pub mod reply;
pub mod router;

pub use errors::RpcError;
pub use executor::{DEFAULT_RPC_WORKERS, RpcExecutor};
pub use method::{FnMethod, MethodInfo, NoRemote, RemoteRpc, RpcMethod, RpcRequest, rpc_fn};
pub use reply::RpcReply;
pub use router::{ExtensionCapabilities, MethodDescriptor, RpcRouter};
