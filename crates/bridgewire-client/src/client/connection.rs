//! Connect worker, per-connection tasks and inbound dispatch.

use std::sync::Arc;

use bridgewire_core::protocol::operations::{inbound, outbound};
use bridgewire_core::protocol::{HelloPacket, IdentifySuccessPacket};
use bridgewire_core::{Envelope, OpCode, ProtocolError};
use bridgewire_events::{BridgeEvent, EventPayload};
use bridgewire_rpc::{RemoteRpc, RpcError, RpcReply, RpcRequest};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::{BridgeClient, ConnectRequest, ConnectionHandle, Inner};
use crate::heartbeat::run_heartbeat;
use crate::operations::{Operation, OperationContext, RpcCallRequest};
use crate::transport::{Frame, FrameSink, FrameStream, TransportChannel};

/// Close code sent when the client shuts down.
const CLOSE_NORMAL: u16 = 1000;

impl Inner {
    // ── Connect worker ──────────────────────────────────────────────────────

    pub(super) async fn run_connect_worker(self: Arc<Self>, mut requests: mpsc::UnboundedReceiver<ConnectRequest>) {
        loop {
            let request = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => break,
                request = requests.recv() => match request {
                    Some(request) => request,
                    None => break,
                },
            };

            if request == ConnectRequest::Retry {
                tokio::select! {
                    biased;
                    () = self.shutdown.cancelled() => break,
                    () = tokio::time::sleep(self.settings.reconnect_delay()) => {}
                }
                self.reconnect_pending.store(false, std::sync::atomic::Ordering::Release);
                if !self.state.begin_connect() {
                    debug!(state = %self.state.state(), "reconnect skipped");
                    continue;
                }
                warn!(url = %self.url(), "attempting to reconnect");
            }

            self.open_connection().await;
        }
        debug!("connect worker stopped");
    }

    async fn open_connection(self: &Arc<Self>) {
        let url = self.url();
        info!(url = %url, "connecting to bridge service");

        let result = tokio::select! {
            biased;
            () = self.shutdown.cancelled() => {
                self.state.connect_failed();
                return;
            }
            result = self.connector.connect(&url) => result,
        };
        let channel = match result {
            Ok(channel) => channel,
            Err(e) => {
                error!(url = %url, error = %e, "failed to open connection");
                self.state.connect_failed();
                self.schedule_reconnect();
                return;
            }
        };

        let Some(generation) = self.state.opened() else {
            debug!(url = %url, "connection opened during shutdown, dropping it");
            return;
        };

        let cancel = self.shutdown.child_token();
        let (writer, outgoing) = mpsc::unbounded_channel();
        *self.connection.lock() = Some(ConnectionHandle {
            generation,
            writer,
            cancel: cancel.clone(),
            heartbeat: None,
        });

        let TransportChannel { sink, stream } = channel;
        let writer_task = tokio::spawn(Arc::clone(self).run_writer(generation, sink, outgoing, cancel.clone()));
        let reader_task = tokio::spawn(Arc::clone(self).run_reader(generation, stream, cancel));
        self.track(writer_task);
        self.track(reader_task);

        info!(url = %url, generation, "connection opened");
        let _ = self
            .events
            .publish_async_on(&self.runtime, BridgeEvent::new(EventPayload::Connected { url }));
    }

    // ── Per-connection tasks ────────────────────────────────────────────────

    async fn run_writer(
        self: Arc<Self>,
        generation: u64,
        mut sink: FrameSink,
        mut outgoing: mpsc::UnboundedReceiver<Frame>,
        cancel: CancellationToken,
    ) {
        loop {
            let frame = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                frame = outgoing.recv() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
            };
            if let Err(e) = sink.send(frame).await {
                error!(generation, error = %e, "failed to write frame");
                self.handle_disconnect(generation, e.to_string());
                return;
            }
        }

        if self.state.is_shutting_down() {
            let _ = sink
                .send(Frame::Close {
                    code: CLOSE_NORMAL,
                    reason: "client shutting down".into(),
                })
                .await;
        }
        let _ = sink.close().await;
        debug!(generation, "writer stopped");
    }

    async fn run_reader(self: Arc<Self>, generation: u64, mut stream: FrameStream, cancel: CancellationToken) {
        let reason = loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!(generation, "reader stopped");
                    return;
                }
                next = stream.next() => next,
            };
            match next {
                Some(Ok(Frame::Text(text))) => {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => return,
                        () = self.handle_text(generation, &text) => {}
                    }
                }
                Some(Ok(Frame::Close { code, reason })) => {
                    info!(generation, code, reason = %reason, "connection closed by server");
                    break if reason.is_empty() {
                        format!("closed with code {code}")
                    } else {
                        reason
                    };
                }
                Some(Err(e)) => {
                    error!(generation, error = %e, "connection error");
                    break e.to_string();
                }
                None => break "connection ended".to_string(),
            }
        };
        self.handle_disconnect(generation, reason);
    }

    // ── Inbound dispatch ────────────────────────────────────────────────────

    async fn handle_text(self: &Arc<Self>, generation: u64, text: &str) {
        if self.profile.read().debug {
            info!(generation, frame = text, "inbound frame");
        }

        let body: Value = match serde_json::from_str(text) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %ProtocolError::from(e), "dropping malformed frame");
                return;
            }
        };
        let envelope = match Envelope::from_value(body.clone()) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "dropping malformed envelope");
                return;
            }
        };

        let event = self
            .events
            .publish(BridgeEvent::new(EventPayload::RawPacket { envelope, body }));
        if event.skip_internal_processing {
            debug!("inbound envelope handled by extension");
            return;
        }
        let EventPayload::RawPacket { envelope, body } = event.payload else {
            return;
        };

        match envelope.op {
            OpCode::Hello => self.on_hello(generation, &envelope),
            OpCode::IdentifySuccess => self.on_identify_success(generation, &envelope),
            OpCode::CallBack => match envelope.correlation_id().map(str::to_owned) {
                Some(callback_id) => {
                    let _ = self.pending.resolve(&callback_id, envelope);
                }
                None => debug!("callback without id ignored"),
            },
            OpCode::Packet => self.on_packet(envelope, body).await,
            OpCode::HeartBeat => trace!(generation, "heartbeat from server"),
            OpCode::Identify => warn!(generation, "unexpected Identify from server ignored"),
        }
    }

    fn on_hello(&self, generation: u64, envelope: &Envelope) {
        let hello: HelloPacket = match envelope.payload_as() {
            Ok(hello) => hello,
            Err(e) => {
                warn!(error = %e, "dropping malformed Hello");
                return;
            }
        };
        if !self.state.is_current(generation) {
            debug!(generation, "Hello for stale connection ignored");
            return;
        }

        let interval = hello.heartbeat_interval();
        info!(
            system = %hello.system_name,
            runtime = %hello.runtime_version,
            version = %hello.app_version,
            session_id = %hello.session_id,
            interval_secs = hello.interval,
            heartbeat_secs = interval,
            "connected to bridge service"
        );
        let profile = self.profile.read().clone();
        info!(
            description = %profile.server_description,
            client_version = %profile.client_version,
            command_supported = profile.command_supported,
            papi_supported = profile.papi_supported,
            "identifying"
        );
        {
            let mut session = self.session.write();
            session.hello = Some(hello);
            session.heartbeat_interval = std::time::Duration::from_secs(interval);
        }

        let mut identify = Envelope::new(OpCode::Identify);
        if let Err(e) = identify.merge(&profile.identify(&self.settings.connection.token)) {
            error!(error = %e, "failed to build Identify");
            return;
        }
        let _ = self.state.identifying(generation);
        if let Err(e) = self.send_envelope(identify) {
            debug!(error = %e, "Identify not sent");
        }
    }

    fn on_identify_success(self: &Arc<Self>, generation: u64, envelope: &Envelope) {
        let identify: IdentifySuccessPacket = match envelope.payload_as() {
            Ok(identify) => identify,
            Err(e) => {
                warn!(error = %e, "dropping malformed IdentifySuccess");
                return;
            }
        };
        if !self.state.ready(generation) {
            debug!(generation, state = %self.state.state(), "IdentifySuccess ignored");
            return;
        }
        info!(server_name = %identify.server_name, "identify accepted, connection ready");

        let hello = {
            let mut session = self.session.write();
            session.identify = Some(identify.clone());
            session.hello.clone().unwrap_or_default()
        };

        if let Err(e) = self.send_envelope(Envelope::notification(outbound::NEED_SYNC_SETTINGS)) {
            debug!(error = %e, "sync settings request not sent");
        }
        self.start_heartbeat(generation);
        let _ = self
            .events
            .publish_async_on(&self.runtime, BridgeEvent::new(EventPayload::Online { hello, identify }));
    }

    fn start_heartbeat(self: &Arc<Self>, generation: u64) {
        let interval = self.session.read().heartbeat_interval;
        let token = {
            let mut slot = self.connection.lock();
            let Some(connection) = slot.as_mut().filter(|c| c.generation == generation) else {
                return;
            };
            if let Some(previous) = connection.heartbeat.take() {
                previous.cancel();
            }
            let token = connection.cancel.child_token();
            connection.heartbeat = Some(token.clone());
            token
        };

        debug!(generation, interval_secs = interval.as_secs(), "starting heartbeat");
        let client = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            let _ = run_heartbeat(interval, token, move || {
                client.upgrade().is_some_and(|inner| inner.beat(generation))
            })
            .await;
        });
        self.track(handle);
    }

    fn beat(&self, generation: u64) -> bool {
        if !self.state.is_current(generation) {
            return false;
        }
        matches!(self.send_envelope(Envelope::heartbeat()), Ok(true))
    }

    async fn on_packet(self: &Arc<Self>, envelope: Envelope, body: Value) {
        let operation = envelope.operation.clone().unwrap_or_default();
        let reply = Envelope::callback_reply(&envelope);
        let event = self.events.publish(BridgeEvent::new(EventPayload::ExecPacket {
            envelope,
            body,
            reply,
        }));
        let skip = event.skip_internal_processing;
        let EventPayload::ExecPacket {
            envelope, mut reply, ..
        } = event.payload
        else {
            return;
        };

        if operation == inbound::RPC_CALL {
            if skip {
                debug!("rpc call handled by extension");
            } else {
                self.dispatch_rpc(envelope, reply);
            }
            return;
        }

        if !skip {
            match Operation::from_name(&operation) {
                Some(op) => {
                    let ctx = OperationContext {
                        behavior: self.behavior.as_ref(),
                        profile: &self.profile,
                        events: &self.events,
                        router: &self.router,
                    };
                    if let Err(e) = op.execute(&ctx, &envelope, &mut reply).await {
                        error!(operation = %operation, error = %e, "operation failed");
                        let _ = reply.payload.insert("success".into(), Value::Bool(false));
                        let _ = reply.payload.insert("error_message".into(), Value::String(e.to_string()));
                    }
                }
                None => info!(operation = %operation, "unknown operation, answering with an empty reply"),
            }
        }

        if let Err(e) = self.send_envelope(reply) {
            debug!(operation = %operation, error = %e, "reply not sent");
        }
    }

    /// Run an inbound `RPC_CALL` on the executor and reply when it finishes.
    fn dispatch_rpc(self: &Arc<Self>, request: Envelope, mut reply: Envelope) {
        let inner = Arc::clone(self);
        let spawned = self.executor.spawn(async move {
            let outcome = match request.payload_as::<RpcCallRequest>() {
                Ok(call) => {
                    let remote: Arc<dyn RemoteRpc> = Arc::new(BridgeClient {
                        inner: Arc::clone(&inner),
                    });
                    inner
                        .router
                        .call(RpcRequest::new(call.identifier, call.method, call.body, remote))
                        .await
                }
                Err(e) => Err(RpcError::InvalidArguments(e.to_string())),
            };
            if let Err(e) = &outcome {
                error!(error = %e, "rpc call failed");
            }
            if let Err(e) = reply.merge(&RpcReply::from_result(outcome)) {
                error!(error = %e, "failed to build rpc reply");
                return;
            }
            if let Err(e) = inner.send_envelope(reply) {
                debug!(error = %e, "rpc reply not sent");
            }
        });
        if spawned.is_none() {
            debug!("rpc call dropped, executor shut down");
        }
    }
}
