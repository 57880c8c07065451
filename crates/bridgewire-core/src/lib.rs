//! # bridgewire-core
//!
//! Foundation types shared by every bridgewire crate.
//!
//! - **Protocol**: [`Envelope`](protocol::Envelope) and [`OpCode`](protocol::OpCode),
//!   handshake packets, and the names of every named operation
//! - **Models**: payload DTOs exchanged inside `Packet` and `CallBack` envelopes
//! - **Extensions**: [`ExtensionInfo`](extension::ExtensionInfo), the identity an
//!   extension supplies when it registers handlers or RPC methods
//! - **Errors**: [`BridgeError`](errors::BridgeError) taxonomy via `thiserror`
//! - **Logging**: `tracing` subscriber initialization

#![deny(unsafe_code)]

pub mod errors;
pub mod extension;
pub mod ids;
pub mod logging;
pub mod models;
pub mod protocol;

pub use errors::{BridgeError, ProtocolError, Result, TransportError};
pub use extension::ExtensionInfo;
pub use ids::CallbackId;
pub use protocol::{Envelope, OpCode};
