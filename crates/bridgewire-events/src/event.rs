//! Events published on the bus.

use bridgewire_core::protocol::{Envelope, HelloPacket, IdentifySuccessPacket};
use serde_json::Value;

use crate::kind::EventKind;

/// Data carried by an event.
#[derive(Clone, Debug, PartialEq)]
pub enum EventPayload {
    /// The socket opened.
    Connected {
        /// Target URL.
        url: String,
    },
    /// The socket closed or failed.
    Disconnected {
        /// Target URL.
        host: String,
        /// Close reason or error text.
        reason: String,
    },
    /// The handshake completed.
    Online {
        /// Server greeting.
        hello: HelloPacket,
        /// Handshake acceptance.
        identify: IdentifySuccessPacket,
    },
    /// An inbound envelope before internal processing.
    RawPacket {
        /// Decoded envelope.
        envelope: Envelope,
        /// The full JSON object as received.
        body: Value,
    },
    /// An inbound `Packet` about to be executed.
    ExecPacket {
        /// Decoded envelope.
        envelope: Envelope,
        /// The full JSON object as received.
        body: Value,
        /// Reply skeleton; handlers may fill it in.
        reply: Envelope,
    },
    /// An outbound envelope about to be written.
    SendPacket {
        /// JSON that will be written; handlers may rewrite it.
        packet: Value,
        /// Whether the packet carries a non-empty callback id.
        has_callback_id: bool,
    },
}

impl EventPayload {
    /// Kind of this payload.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connected { .. } => EventKind::Connected,
            Self::Disconnected { .. } => EventKind::Disconnected,
            Self::Online { .. } => EventKind::Online,
            Self::RawPacket { .. } => EventKind::RawPacket,
            Self::ExecPacket { .. } => EventKind::ExecPacket,
            Self::SendPacket { .. } => EventKind::SendPacket,
        }
    }
}

/// An event with its propagation flags.
#[derive(Clone, Debug, PartialEq)]
pub struct BridgeEvent {
    /// Event data.
    pub payload: EventPayload,
    /// Set by a handler to cancel the event.
    pub cancelled: bool,
    /// Whether lower-priority handlers still run after cancellation.
    pub continue_propagation: bool,
    /// For packet events: skip the client's own handling.
    pub skip_internal_processing: bool,
}

impl BridgeEvent {
    /// Wrap a payload with default flags.
    #[must_use]
    pub fn new(payload: EventPayload) -> Self {
        Self {
            payload,
            cancelled: false,
            continue_propagation: true,
            skip_internal_processing: false,
        }
    }

    /// Kind of this event.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// Cancel the event and stop lower-priority handlers.
    pub fn cancel_and_stop(&mut self) {
        self.cancelled = true;
        self.continue_propagation = false;
    }

    /// Whether dispatch must stop after the current handler.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.cancelled && !self.continue_propagation
    }

    /// Reply skeleton of an `ExecPacket` event.
    pub fn reply_mut(&mut self) -> Option<&mut Envelope> {
        match &mut self.payload {
            EventPayload::ExecPacket { reply, .. } => Some(reply),
            _ => None,
        }
    }

    /// Envelope of a packet event.
    #[must_use]
    pub fn envelope(&self) -> Option<&Envelope> {
        match &self.payload {
            EventPayload::RawPacket { envelope, .. } | EventPayload::ExecPacket { envelope, .. } => {
                Some(envelope)
            }
            _ => None,
        }
    }

    /// Outbound JSON of a `SendPacket` event.
    pub fn outbound_mut(&mut self) -> Option<&mut Value> {
        match &mut self.payload {
            EventPayload::SendPacket { packet, .. } => Some(packet),
            _ => None,
        }
    }
}

impl From<EventPayload> for BridgeEvent {
    fn from(payload: EventPayload) -> Self {
        Self::new(payload)
    }
}
