//! Wire protocol: JSON text envelopes tagged with an opcode.
//!
//! | Opcode | Direction | Purpose |
//! |---|---|---|
//! | `Hello` | server → client | handshake start, carries heartbeat interval |
//! | `Identify` | client → server | handshake response with token |
//! | `IdentifySuccess` | server → client | handshake complete |
//! | `HeartBeat` | client → server | keep-alive |
//! | `Packet` | both | named operation request or notification |
//! | `CallBack` | both | reply correlated by `callback_id` |

pub mod envelope;
pub mod handshake;
pub mod operations;

pub use envelope::{Envelope, OpCode};
pub use handshake::{
    HelloPacket, IdentifyPacket, IdentifySuccessPacket, negotiated_heartbeat_interval,
};
