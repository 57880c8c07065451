//! In-process transport.
//!
//! [`memory_transport`] returns a [`MemoryConnector`] to hand to the client and
//! a [`MemoryServer`] that accepts its connections as [`MemoryPeer`]s. Each
//! peer plays the remote service for one connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bridgewire_core::{Envelope, TransportError};
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use serde_json::Value;

use crate::transport::{Connector, Frame, TransportChannel};

/// Create a connected connector/server pair.
pub fn memory_transport() -> (MemoryConnector, MemoryServer) {
    let (accept_tx, accept_rx) = mpsc::unbounded();
    let shared = Arc::new(Shared::default());
    (
        MemoryConnector {
            accept_tx,
            shared: Arc::clone(&shared),
        },
        MemoryServer { accept_rx, shared },
    )
}

#[derive(Debug, Default)]
struct Shared {
    refuse: AtomicBool,
    attempts: AtomicUsize,
}

/// Client side of the in-process transport.
#[derive(Clone, Debug)]
pub struct MemoryConnector {
    accept_tx: mpsc::UnboundedSender<MemoryPeer>,
    shared: Arc<Shared>,
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, url: &str) -> Result<TransportChannel, TransportError> {
        let _ = self.shared.attempts.fetch_add(1, Ordering::SeqCst);
        if self.shared.refuse.load(Ordering::SeqCst) {
            return Err(TransportError::Connect {
                url: url.to_string(),
                message: "connection refused".into(),
            });
        }

        let (to_client, client_rx) = mpsc::unbounded();
        let (client_tx, from_client) = mpsc::unbounded();
        let peer = MemoryPeer {
            url: url.to_string(),
            to_client,
            from_client,
        };
        self.accept_tx
            .unbounded_send(peer)
            .map_err(|_| TransportError::Connect {
                url: url.to_string(),
                message: "server is gone".into(),
            })?;

        let sink = client_tx.sink_map_err(|e| TransportError::Send(e.to_string()));
        Ok(TransportChannel::new(sink, client_rx))
    }
}

/// Server side of the in-process transport.
#[derive(Debug)]
pub struct MemoryServer {
    accept_rx: mpsc::UnboundedReceiver<MemoryPeer>,
    shared: Arc<Shared>,
}

impl MemoryServer {
    /// Wait for the next connection.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.accept_rx.next().await
    }

    /// Make further connection attempts fail (or succeed again).
    pub fn refuse_connections(&self, refuse: bool) {
        self.shared.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Connection attempts seen so far, refused ones included.
    pub fn attempts(&self) -> usize {
        self.shared.attempts.load(Ordering::SeqCst)
    }
}

/// The remote end of one in-process connection.
#[derive(Debug)]
pub struct MemoryPeer {
    /// URL the client connected to.
    pub url: String,
    to_client: mpsc::UnboundedSender<Result<Frame, TransportError>>,
    from_client: mpsc::UnboundedReceiver<Frame>,
}

impl MemoryPeer {
    /// Deliver a text frame. Returns `false` when the client side is gone.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.to_client
            .unbounded_send(Ok(Frame::Text(text.into())))
            .is_ok()
    }

    /// Deliver a JSON value as a text frame.
    pub fn send_json(&self, value: &Value) -> bool {
        self.send_text(value.to_string())
    }

    /// Deliver an envelope.
    pub fn send_envelope(&self, envelope: &Envelope) -> bool {
        self.send_json(&envelope.to_value())
    }

    /// Deliver a close frame.
    pub fn close(&self, code: u16, reason: impl Into<String>) -> bool {
        self.to_client
            .unbounded_send(Ok(Frame::Close {
                code,
                reason: reason.into(),
            }))
            .is_ok()
    }

    /// Deliver a read error.
    pub fn fail(&self, message: impl Into<String>) -> bool {
        self.to_client
            .unbounded_send(Err(TransportError::Receive(message.into())))
            .is_ok()
    }

    /// Next frame written by the client. `None` once the client dropped its sink.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.from_client.next().await
    }

    /// Next envelope written by the client, skipping close frames and
    /// text that does not decode.
    pub async fn recv_envelope(&mut self) -> Option<Envelope> {
        loop {
            match self.recv().await? {
                Frame::Text(text) => {
                    if let Ok(envelope) = Envelope::decode(&text) {
                        return Some(envelope);
                    }
                }
                Frame::Close { .. } => {}
            }
        }
    }

    /// Next envelope that is not a heartbeat.
    pub async fn recv_non_heartbeat(&mut self) -> Option<Envelope> {
        loop {
            let envelope = self.recv_envelope().await?;
            if !envelope.is_heartbeat() {
                return Some(envelope);
            }
        }
    }

    /// Close the stream towards the client without a close frame.
    pub fn hang_up(self) {
        self.to_client.close_channel();
    }
}
