//! # bridgewire-events
//!
//! Priority-ordered, cancellable event bus.
//!
//! Extensions subscribe a [`Listener`] (a batch of named handlers, each with a
//! target [`EventKind`] and a [`Priority`]). The client publishes
//! [`BridgeEvent`]s synchronously on its inbound path, or asynchronously on a
//! bounded blocking pool for lifecycle events.

#![deny(unsafe_code)]

pub mod bus;
pub mod errors;
pub mod event;
pub mod kind;
pub mod listener;

pub use bus::{DEFAULT_EVENT_WORKERS, EventBus, ListenerId};
pub use errors::{EventError, HandlerError};
pub use event::{BridgeEvent, EventPayload};
pub use kind::{EventKind, Priority};
pub use listener::{EventCallback, HandlerSpec, KindTarget, Listener};
