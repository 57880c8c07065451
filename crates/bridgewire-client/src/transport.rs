//! Socket abstraction.
//!
//! The client only ever sees a [`TransportChannel`]: a sink and a stream of
//! text [`Frame`]s. [`WsConnector`] opens real WebSocket connections;
//! [`crate::memory`] provides an in-process pair for tests and embedding.

use std::pin::Pin;

use async_trait::async_trait;
use bridgewire_core::TransportError;
use futures::{Sink, SinkExt, Stream, StreamExt, future};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, trace};

/// Close code reported when the peer closed without a status.
pub const CLOSE_NO_STATUS: u16 = 1005;

/// One unit exchanged with the socket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// A JSON text message.
    Text(String),
    /// The connection is closing.
    Close {
        /// WebSocket close code.
        code: u16,
        /// Close reason.
        reason: String,
    },
}

impl Frame {
    fn into_message(self) -> Message {
        match self {
            Self::Text(text) => Message::text(text),
            Self::Close { code, reason } => Message::Close(Some(CloseFrame {
                code: CloseCode::from(code),
                reason: reason.into(),
            })),
        }
    }

    fn from_message(message: Message) -> Option<Self> {
        match message {
            Message::Text(text) => Some(Self::Text(text.as_str().to_owned())),
            Message::Close(frame) => Some(frame.map_or_else(
                || Self::Close {
                    code: CLOSE_NO_STATUS,
                    reason: String::new(),
                },
                |f| Self::Close {
                    code: u16::from(f.code),
                    reason: f.reason.as_str().to_owned(),
                },
            )),
            Message::Binary(data) => {
                debug!(len = data.len(), "ignoring binary frame");
                None
            }
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => None,
        }
    }
}

/// Outbound half of a connection.
pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = TransportError> + Send>>;

/// Inbound half of a connection. Ends when the socket closes.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame, TransportError>> + Send>>;

/// An open connection split into its two halves.
pub struct TransportChannel {
    /// Frames written to the peer.
    pub sink: FrameSink,
    /// Frames read from the peer.
    pub stream: FrameStream,
}

impl TransportChannel {
    /// Build a channel from any sink and stream of frames.
    pub fn new<Si, St>(sink: Si, stream: St) -> Self
    where
        Si: Sink<Frame, Error = TransportError> + Send + 'static,
        St: Stream<Item = Result<Frame, TransportError>> + Send + 'static,
    {
        Self {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        }
    }
}

impl std::fmt::Debug for TransportChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportChannel").finish_non_exhaustive()
    }
}

/// Opens connections to a URL.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a connection.
    async fn connect(&self, url: &str) -> Result<TransportChannel, TransportError>;
}

/// WebSocket connector over `tokio-tungstenite`.
#[derive(Clone, Copy, Debug, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<TransportChannel, TransportError> {
        let (ws, response) = connect_async(url)
            .await
            .map_err(|e| TransportError::Connect {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        trace!(url, status = %response.status(), "websocket upgrade complete");

        let (ws_tx, ws_rx) = ws.split();
        let sink = ws_tx
            .sink_map_err(|e| TransportError::Send(e.to_string()))
            .with(|frame: Frame| future::ready(Ok::<_, TransportError>(frame.into_message())));
        let stream = ws_rx.filter_map(|message| {
            future::ready(match message {
                Ok(message) => Frame::from_message(message).map(Ok),
                Err(e) => Some(Err(TransportError::Receive(e.to_string()))),
            })
        });
        Ok(TransportChannel::new(sink, stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_frames_round_trip_through_messages() {
        let message = Frame::Text("{\"op\":3}".into()).into_message();
        assert_eq!(
            Frame::from_message(message),
            Some(Frame::Text("{\"op\":3}".into()))
        );
    }

    #[test]
    fn close_without_status_uses_no_status_code() {
        assert_eq!(
            Frame::from_message(Message::Close(None)),
            Some(Frame::Close {
                code: CLOSE_NO_STATUS,
                reason: String::new()
            })
        );
    }

    #[test]
    fn close_frame_keeps_code_and_reason() {
        let message = Frame::Close {
            code: 1000,
            reason: "bye".into(),
        }
        .into_message();
        assert_eq!(
            Frame::from_message(message),
            Some(Frame::Close {
                code: 1000,
                reason: "bye".into()
            })
        );
    }

    #[test]
    fn control_frames_are_skipped() {
        assert_eq!(Frame::from_message(Message::Ping(Default::default())), None);
        assert_eq!(Frame::from_message(Message::Binary(vec![1u8, 2].into())), None);
    }

    #[tokio::test]
    async fn ws_connect_failure_is_transport_error() {
        let err = WsConnector.connect("ws://127.0.0.1:1/bridge").await.unwrap_err();
        assert!(matches!(err, TransportError::Connect { ref url, .. } if url == "ws://127.0.0.1:1/bridge"));
    }
}
