//! The connection manager.
//!
//! A [`BridgeClient`] owns one logical connection to the bridge service. It
//! reconnects on its own, answers inbound operations through a
//! [`BridgeBehavior`], routes inbound `RPC_CALL`s to its [`RpcRouter`], and
//! publishes lifecycle and packet events on its [`EventBus`].
//!
//! Tasks:
//! - one connect worker, alive for the lifetime of the client
//! - one deadline tracker for pending calls
//! - per connection: a reader (the only inbound path), a writer and a
//!   heartbeat
//!
//! [`BridgeClient::shutdown`] must be called to stop them.

mod connection;
mod requests;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bridgewire_core::protocol::{HelloPacket, IdentifySuccessPacket};
use bridgewire_core::{BridgeError, CallbackId, Envelope, Result};
use bridgewire_events::{BridgeEvent, EventBus, EventPayload};
use bridgewire_rpc::{RemoteRpc, RpcError, RpcExecutor, RpcRouter};
use bridgewire_settings::BridgeSettings;
use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::behavior::BridgeBehavior;
use crate::pending::PendingCalls;
use crate::profile::ClientProfile;
use crate::state::{ConnectionState, ConnectionStateMachine};
use crate::transport::{Connector, Frame, WsConnector};

/// How long [`BridgeClient::shutdown`] waits for tasks to finish.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Heartbeat interval used before the first `Hello`.
const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(120);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ConnectRequest {
    /// Open now; the state is already `Connecting`.
    Open,
    /// Wait for the reconnect delay, then open if still disconnected.
    Retry,
}

/// Live socket of one generation.
struct ConnectionHandle {
    generation: u64,
    writer: mpsc::UnboundedSender<Frame>,
    cancel: CancellationToken,
    heartbeat: Option<CancellationToken>,
}

/// Data learned during the handshake.
#[derive(Clone, Debug)]
struct Session {
    hello: Option<HelloPacket>,
    identify: Option<IdentifySuccessPacket>,
    heartbeat_interval: Duration,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            hello: None,
            identify: None,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }
}

struct Inner {
    settings: BridgeSettings,
    url: RwLock<String>,
    connector: Arc<dyn Connector>,
    behavior: Arc<dyn BridgeBehavior>,
    events: Arc<EventBus>,
    router: Arc<RpcRouter>,
    executor: RpcExecutor,
    pending: PendingCalls,
    state: ConnectionStateMachine,
    shutdown: CancellationToken,
    connection: Mutex<Option<ConnectionHandle>>,
    session: RwLock<Session>,
    profile: RwLock<ClientProfile>,
    connect_tx: mpsc::UnboundedSender<ConnectRequest>,
    reconnect_pending: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    runtime: Handle,
}

/// Builder for [`BridgeClient`].
pub struct BridgeClientBuilder {
    settings: BridgeSettings,
    behavior: Arc<dyn BridgeBehavior>,
    connector: Arc<dyn Connector>,
    events: Option<Arc<EventBus>>,
    router: Option<Arc<RpcRouter>>,
}

impl BridgeClientBuilder {
    /// Use a custom transport instead of [`WsConnector`].
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    /// Share an existing event bus.
    #[must_use]
    pub fn events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Share an existing RPC router.
    #[must_use]
    pub fn router(mut self, router: Arc<RpcRouter>) -> Self {
        self.router = Some(router);
        self
    }

    /// Build the client and start its background workers. Does not connect.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> BridgeClient {
        let shutdown = CancellationToken::new();
        let (pending, tracker) = PendingCalls::spawn(shutdown.child_token());
        let (connect_tx, connect_rx) = mpsc::unbounded_channel();
        let events = self
            .events
            .unwrap_or_else(|| Arc::new(EventBus::new(self.settings.workers.event_workers)));
        let router = self.router.unwrap_or_default();

        let inner = Arc::new(Inner {
            url: RwLock::new(self.settings.connection.url.clone()),
            profile: RwLock::new(ClientProfile::from(&self.settings.profile)),
            executor: RpcExecutor::new(self.settings.workers.rpc_workers),
            settings: self.settings,
            connector: self.connector,
            behavior: self.behavior,
            events,
            router,
            pending,
            state: ConnectionStateMachine::new(),
            shutdown,
            connection: Mutex::new(None),
            session: RwLock::new(Session::default()),
            connect_tx,
            reconnect_pending: AtomicBool::new(false),
            tasks: Mutex::new(vec![tracker]),
            runtime: Handle::current(),
        });

        let worker = tokio::spawn(Arc::clone(&inner).run_connect_worker(connect_rx));
        inner.track(worker);
        BridgeClient { inner }
    }
}

/// Handle to the bridge connection. Cheap to clone.
#[derive(Clone)]
pub struct BridgeClient {
    inner: Arc<Inner>,
}

impl BridgeClient {
    /// Start building a client.
    pub fn builder(settings: BridgeSettings, behavior: Arc<dyn BridgeBehavior>) -> BridgeClientBuilder {
        BridgeClientBuilder {
            settings,
            behavior,
            connector: Arc::new(WsConnector),
            events: None,
            router: None,
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────────────────

    /// Start connecting.
    ///
    /// Returns immediately; the attempt runs on the connect worker. A call
    /// while connecting or connected does nothing.
    pub fn connect(&self) -> Result<()> {
        let inner = &self.inner;
        if inner.state.is_shutting_down() {
            return Err(BridgeError::Shutdown);
        }
        if !inner.state.begin_connect() {
            debug!(state = %inner.state.state(), "connect ignored, already active");
            return Ok(());
        }
        if inner.connect_tx.send(ConnectRequest::Open).is_err() {
            inner.state.connect_failed();
            return Err(BridgeError::Shutdown);
        }
        Ok(())
    }

    /// Point the client at a new URL.
    ///
    /// An open connection is dropped and the client reconnects to the new
    /// URL after the reconnect delay. May be called from any thread.
    pub fn set_url(&self, url: impl Into<String>) {
        let url = url.into();
        info!(url = %url, "bridge url changed");
        *self.inner.url.write() = url;
        let generation = self.inner.connection.lock().as_ref().map(|c| c.generation);
        if let Some(generation) = generation {
            self.inner.handle_disconnect(generation, "url changed".into());
        }
    }

    /// Stop everything without waiting.
    ///
    /// Pending calls fail with [`BridgeError::Shutdown`]; later calls fail
    /// immediately. Returns `false` if the client was already shut down.
    pub fn close(&self) -> bool {
        let inner = &self.inner;
        if !inner.state.shut_down() {
            return false;
        }
        info!("bridge client shutting down");
        inner.shutdown.cancel();
        let failed = inner.pending.fail_all();
        inner.executor.shutdown();
        drop(inner.connection.lock().take());
        inner.reconnect_pending.store(false, Ordering::Release);
        debug!(failed, "pending calls cancelled");
        true
    }

    /// Stop everything and wait for background tasks to finish.
    pub async fn shutdown(&self) {
        let _ = self.close();
        let handles = std::mem::take(&mut *self.inner.tasks.lock());
        debug!(task_count = handles.len(), "waiting for bridge tasks");
        let drain = futures::future::join_all(handles);
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, drain).await.is_err() {
            warn!("shutdown timed out after {SHUTDOWN_TIMEOUT:?}, some tasks may still be running");
        }
        info!("bridge client stopped");
    }

    // ── Sending ─────────────────────────────────────────────────────────────

    /// Send an envelope without waiting for a reply.
    ///
    /// `SendPacket` handlers see it first and may rewrite or cancel it. With
    /// no open socket the envelope is dropped with a warning.
    pub fn send(&self, envelope: Envelope) -> Result<()> {
        let _ = self.inner.send_envelope(envelope)?;
        Ok(())
    }

    /// Send `envelope` with a fresh callback id and wait for its `CallBack`.
    ///
    /// Exactly one of: the reply, [`BridgeError::Timeout`] after `timeout`,
    /// or [`BridgeError::Shutdown`].
    pub async fn send_and_await_reply(&self, envelope: Envelope, timeout: Duration) -> Result<Envelope> {
        let inner = &self.inner;
        if inner.state.is_shutting_down() {
            return Err(BridgeError::Shutdown);
        }
        let callback_id = CallbackId::new();
        let reply = inner.pending.register(&callback_id, timeout);
        let envelope = envelope.with_callback_id(callback_id.as_str());
        if let Err(e) = inner.send_envelope(envelope) {
            inner.pending.cancel(callback_id.as_str());
            return Err(e);
        }
        reply.await.unwrap_or(Err(BridgeError::Shutdown))
    }

    /// [`BridgeClient::send_and_await_reply`] with the configured call timeout.
    pub async fn request(&self, envelope: Envelope) -> Result<Envelope> {
        let timeout = self.inner.settings.call_timeout();
        self.send_and_await_reply(envelope, timeout).await
    }

    // ── Inspection ──────────────────────────────────────────────────────────

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.inner.state.state()
    }

    /// Whether the handshake has completed on the live connection.
    pub fn is_ready(&self) -> bool {
        self.state() == ConnectionState::Ready
    }

    /// Generation of the most recent connection.
    pub fn generation(&self) -> u64 {
        self.inner.state.generation()
    }

    /// Current target URL.
    pub fn url(&self) -> String {
        self.inner.url()
    }

    /// `Hello` of the current session.
    pub fn hello(&self) -> Option<HelloPacket> {
        self.inner.session.read().hello.clone()
    }

    /// `IdentifySuccess` of the current session.
    pub fn identify_success(&self) -> Option<IdentifySuccessPacket> {
        self.inner.session.read().identify.clone()
    }

    /// Heartbeat interval negotiated with the service.
    pub fn heartbeat_interval(&self) -> Duration {
        self.inner.session.read().heartbeat_interval
    }

    /// Snapshot of the runtime profile.
    pub fn profile(&self) -> ClientProfile {
        self.inner.profile.read().clone()
    }

    /// Number of calls awaiting a reply.
    pub fn pending_calls(&self) -> usize {
        self.inner.pending.len()
    }

    /// Event bus this client publishes on.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.inner.events
    }

    /// Router inbound `RPC_CALL`s are dispatched to.
    pub fn router(&self) -> &Arc<RpcRouter> {
        &self.inner.router
    }

    /// Settings the client was built with.
    pub fn settings(&self) -> &BridgeSettings {
        &self.inner.settings
    }
}

impl fmt::Debug for BridgeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeClient")
            .field("url", &self.url())
            .field("state", &self.state())
            .field("generation", &self.generation())
            .field("pending", &self.pending_calls())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RemoteRpc for BridgeClient {
    async fn call(&self, extension_id: &str, method: &str, body: serde_json::Value) -> std::result::Result<serde_json::Value, RpcError> {
        self.rpc_call(extension_id, method, body).await.map_err(|e| match e {
            BridgeError::Remote { message } => RpcError::Remote(message),
            BridgeError::Shutdown => RpcError::Cancelled,
            other => RpcError::Remote(other.to_string()),
        })
    }
}

impl Inner {
    fn url(&self) -> String {
        self.url.read().clone()
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut tasks = self.tasks.lock();
        tasks.retain(|h| !h.is_finished());
        tasks.push(handle);
    }

    /// Publish `SendPacket`, then hand the (possibly rewritten) JSON to the
    /// writer. Returns whether it reached an open socket.
    fn send_envelope(&self, envelope: Envelope) -> Result<bool> {
        if self.state.is_shutting_down() {
            return Err(BridgeError::Shutdown);
        }
        let heartbeat = envelope.is_heartbeat();
        let op = envelope.op;
        let event = self.events.publish(BridgeEvent::new(EventPayload::SendPacket {
            has_callback_id: envelope.correlation_id().is_some(),
            packet: envelope.to_value(),
        }));
        if event.cancelled {
            debug!(op = %op, "outbound packet cancelled by handler");
            return Ok(false);
        }
        let EventPayload::SendPacket { packet, .. } = event.payload else {
            return Ok(false);
        };

        let guard = self.connection.lock();
        let sent = guard
            .as_ref()
            .is_some_and(|conn| conn.writer.send(Frame::Text(packet.to_string())).is_ok());
        drop(guard);
        if !sent && !heartbeat {
            warn!(op = %op, "no open connection, outbound packet dropped");
        }
        Ok(sent)
    }

    /// Close-or-error path for `generation`. Only the first signal for the
    /// live generation has any effect.
    fn handle_disconnect(&self, generation: u64, reason: String) {
        if !self.state.reset(generation) {
            debug!(generation, reason = %reason, "ignoring close signal for stale connection");
            return;
        }
        let connection = {
            let mut slot = self.connection.lock();
            if slot.as_ref().is_some_and(|c| c.generation == generation) {
                slot.take()
            } else {
                None
            }
        };
        if let Some(connection) = connection {
            connection.cancel.cancel();
        }
        *self.session.write() = Session::default();

        let host = self.url();
        warn!(generation, host = %host, reason = %reason, "connection lost");
        let _ = self
            .events
            .publish_async_on(&self.runtime, BridgeEvent::new(EventPayload::Disconnected { host, reason }));
        self.schedule_reconnect();
    }

    /// Queue one reconnect attempt unless one is already pending.
    fn schedule_reconnect(&self) {
        if self.state.is_shutting_down() {
            return;
        }
        if self.reconnect_pending.swap(true, Ordering::AcqRel) {
            debug!("reconnect already scheduled");
            return;
        }
        let delay = self.settings.reconnect_delay();
        if self.connect_tx.send(ConnectRequest::Retry).is_err() {
            self.reconnect_pending.store(false, Ordering::Release);
            return;
        }
        info!(delay_secs = delay.as_secs(), "reconnect scheduled");
    }
}
