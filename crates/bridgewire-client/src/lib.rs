//! # bridgewire-client
//!
//! Client side of the bridgewire protocol.
//!
//! - [`BridgeClient`]: one logical connection with handshake, heartbeat,
//!   reconnection and correlated request/reply calls
//! - [`BridgeBehavior`]: host actions invoked by inbound named operations
//! - [`Connector`]: transport seam, with [`WsConnector`] for WebSockets and
//!   [`memory_transport`] for in-process tests

#![deny(unsafe_code)]

pub mod behavior;
pub mod client;
pub mod heartbeat;
pub mod memory;
pub mod operations;
pub mod pending;
pub mod profile;
pub mod state;
pub mod transport;

pub use behavior::{BehaviorError, BehaviorResult, BridgeBehavior};
pub use client::{BridgeClient, BridgeClientBuilder};
pub use heartbeat::{HeartbeatStats, run_heartbeat};
pub use memory::{MemoryConnector, MemoryPeer, MemoryServer, memory_transport};
pub use operations::Operation;
pub use pending::{PendingCalls, ReplyResult};
pub use profile::ClientProfile;
pub use state::{ConnectionState, ConnectionStateMachine};
pub use transport::{Connector, Frame, TransportChannel, WsConnector};
