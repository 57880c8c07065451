//! Event bus.
//!
//! Handlers are stored per [`EventKind`] in copy-on-write vectors, so a
//! publication works on a snapshot and handlers may subscribe or unsubscribe
//! from inside a callback without deadlocking.
//!
//! # Dispatch
//!
//! `publish` collects the handlers of every kind the event matches, sorts them
//! by descending priority (ties keep registration order) and runs them one by
//! one. After each handler, dispatch stops if the event is cancelled and its
//! `continue_propagation` flag is cleared.
//!
//! # Fail-Open
//!
//! Handler errors and panics are logged with the owning extension and handler
//! name, then dispatch moves on. `publish` itself never fails.

use std::any::Any;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bridgewire_core::ExtensionInfo;
use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::errors::EventError;
use crate::event::BridgeEvent;
use crate::kind::{EventKind, Priority};
use crate::listener::{EventCallback, HandlerSpec, Listener};

/// Default number of concurrent asynchronous publications.
pub const DEFAULT_EVENT_WORKERS: usize = 64;

/// Handle to a subscribed [`Listener`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

struct RegisteredHandler {
    listener: ListenerId,
    extension: Arc<ExtensionInfo>,
    name: String,
    priority: Priority,
    seq: u64,
    callback: EventCallback,
}

/// Priority-ordered, cancellable event bus.
pub struct EventBus {
    handlers: DashMap<EventKind, Arc<Vec<Arc<RegisteredHandler>>>>,
    next_seq: AtomicU64,
    next_listener: AtomicU64,
    async_permits: Arc<Semaphore>,
}

impl EventBus {
    /// Create a bus allowing `event_workers` concurrent async publications.
    #[must_use]
    pub fn new(event_workers: usize) -> Self {
        Self {
            handlers: DashMap::new(),
            next_seq: AtomicU64::new(0),
            next_listener: AtomicU64::new(0),
            async_permits: Arc::new(Semaphore::new(event_workers.max(1))),
        }
    }

    /// Register every valid handler of `listener` under `extension`.
    ///
    /// Handlers with an empty name or an unrecognized kind are logged and
    /// skipped; the rest of the batch is still registered. Returns `None` when
    /// nothing was registered.
    pub fn subscribe(&self, extension: ExtensionInfo, listener: Listener) -> Option<ListenerId> {
        let extension = Arc::new(extension);
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        let mut registered = 0usize;

        for spec in listener.into_handlers() {
            let kind = match validate(&spec) {
                Ok(kind) => kind,
                Err(e) => {
                    warn!(
                        extension = %extension.id,
                        handler = %spec.name,
                        error = %e,
                        "skipping invalid event handler"
                    );
                    continue;
                }
            };
            let handler = Arc::new(RegisteredHandler {
                listener: id,
                extension: Arc::clone(&extension),
                name: spec.name,
                priority: spec.priority,
                seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
                callback: spec.callback,
            });
            debug!(
                extension = %extension.id,
                handler = %handler.name,
                kind = %kind,
                priority = %handler.priority,
                "registering event handler"
            );
            self.insert(kind, handler);
            registered += 1;
        }

        (registered > 0).then_some(id)
    }

    /// Remove every handler of a listener. Returns how many were removed.
    pub fn unsubscribe(&self, listener: ListenerId) -> usize {
        let removed = self.remove_where(|h| h.listener == listener);
        if removed > 0 {
            debug!(%listener, removed, "unsubscribed listener");
        }
        removed
    }

    /// Remove every handler owned by an extension. Returns how many were removed.
    pub fn unsubscribe_extension(&self, extension_id: &str) -> usize {
        let removed = self.remove_where(|h| h.extension.id == extension_id);
        if removed > 0 {
            debug!(extension = %extension_id, removed, "unsubscribed extension");
        }
        removed
    }

    /// Dispatch `event` synchronously and return it with handler changes.
    pub fn publish(&self, mut event: BridgeEvent) -> BridgeEvent {
        let kind = event.kind();
        for handler in self.collect(kind) {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| (handler.callback)(&mut event)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(
                        extension = %handler.extension.id,
                        handler = %handler.name,
                        kind = %kind,
                        error = %e,
                        "event handler failed (fail-open)"
                    );
                }
                Err(payload) => {
                    error!(
                        extension = %handler.extension.id,
                        handler = %handler.name,
                        kind = %kind,
                        panic = %panic_message(payload.as_ref()),
                        "event handler panicked (fail-open)"
                    );
                }
            }
            if event.is_halted() {
                debug!(
                    extension = %handler.extension.id,
                    handler = %handler.name,
                    kind = %kind,
                    "event cancelled, propagation stopped"
                );
                break;
            }
        }
        event
    }

    /// Dispatch `event` on the blocking pool.
    ///
    /// At most `event_workers` publications run at once; the rest queue. The
    /// handle resolves to the dispatched event, or `None` if the runtime shut
    /// down first. Must be called from within a tokio runtime; use
    /// [`EventBus::publish_async_on`] from other threads.
    pub fn publish_async(self: &Arc<Self>, event: BridgeEvent) -> JoinHandle<Option<BridgeEvent>> {
        self.publish_async_on(&Handle::current(), event)
    }

    /// [`EventBus::publish_async`] on an explicit runtime. Safe to call from
    /// any thread.
    pub fn publish_async_on(self: &Arc<Self>, runtime: &Handle, event: BridgeEvent) -> JoinHandle<Option<BridgeEvent>> {
        let bus = Arc::clone(self);
        let permits = Arc::clone(&self.async_permits);
        runtime.spawn(async move {
            let _permit = permits.acquire_owned().await.ok();
            let kind = event.kind();
            match tokio::task::spawn_blocking(move || bus.publish(event)).await {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!(kind = %kind, error = %e, "async publication aborted");
                    None
                }
            }
        })
    }

    /// Distinct extensions that own at least one handler, sorted by id.
    #[must_use]
    pub fn list_extensions(&self) -> Vec<ExtensionInfo> {
        let mut seen: BTreeMap<String, ExtensionInfo> = BTreeMap::new();
        for slot in &self.handlers {
            for handler in slot.value().iter() {
                let _ = seen
                    .entry(handler.extension.id.clone())
                    .or_insert_with(|| (*handler.extension).clone());
            }
        }
        seen.into_values().collect()
    }

    /// Names of the handlers an event of `kind` would reach, in dispatch order.
    #[must_use]
    pub fn handler_names(&self, kind: EventKind) -> Vec<String> {
        self.collect(kind).iter().map(|h| h.name.clone()).collect()
    }

    /// Total number of registered handlers.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.iter().map(|slot| slot.value().len()).sum()
    }

    fn insert(&self, kind: EventKind, handler: Arc<RegisteredHandler>) {
        let mut slot = self.handlers.entry(kind).or_default();
        let mut next = Vec::with_capacity(slot.len() + 1);
        next.extend(slot.iter().cloned());
        next.push(handler);
        *slot = Arc::new(next);
    }

    fn remove_where<P>(&self, pred: P) -> usize
    where
        P: Fn(&RegisteredHandler) -> bool,
    {
        let mut removed = 0;
        for mut slot in self.handlers.iter_mut() {
            if !slot.iter().any(|h| pred(h)) {
                continue;
            }
            let next: Vec<_> = slot.iter().filter(|h| !pred(h)).cloned().collect();
            removed += slot.len() - next.len();
            *slot = Arc::new(next);
        }
        removed
    }

    fn collect(&self, kind: EventKind) -> Vec<Arc<RegisteredHandler>> {
        let mut out = Vec::new();
        for k in kind.matches() {
            let snapshot = self.handlers.get(k).map(|slot| Arc::clone(slot.value()));
            if let Some(list) = snapshot {
                out.extend(list.iter().cloned());
            }
        }
        out.sort_by_key(|h| (Reverse(h.priority), h.seq));
        out
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_WORKERS)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("handler_count", &self.handler_count())
            .finish_non_exhaustive()
    }
}

fn validate(spec: &HandlerSpec) -> Result<EventKind, EventError> {
    if spec.name.trim().is_empty() {
        return Err(EventError::EmptyHandlerName);
    }
    spec.target.resolve()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::HandlerError;
    use crate::event::EventPayload;
    use bridgewire_core::protocol::{Envelope, HelloPacket, IdentifySuccessPacket};
    use parking_lot::Mutex;
    use serde_json::json;

    fn ext(id: &str) -> ExtensionInfo {
        ExtensionInfo::new(id, id)
    }

    fn send_event() -> BridgeEvent {
        BridgeEvent::new(EventPayload::SendPacket {
            packet: json!({"op": 4}),
            has_callback_id: false,
        })
    }

    fn exec_event() -> BridgeEvent {
        let request = Envelope::packet("RUN_COMMAND").with_callback_id("c1");
        BridgeEvent::new(EventPayload::ExecPacket {
            body: request.to_value(),
            reply: Envelope::callback_reply(&request),
            envelope: request,
        })
    }

    fn recorder(
        log: &Arc<Mutex<Vec<&'static str>>>,
        tag: &'static str,
    ) -> impl Fn(&mut BridgeEvent) -> Result<(), HandlerError> + Send + Sync + 'static {
        let log = Arc::clone(log);
        move |_| {
            log.lock().push(tag);
            Ok(())
        }
    }

    #[test]
    fn publish_runs_in_priority_order() {
        let bus = EventBus::default();
        let log = Arc::new(Mutex::new(Vec::new()));
        let _ = bus.subscribe(
            ext("a"),
            Listener::new()
                .on(EventKind::SendPacket, Priority::Low, "low", recorder(&log, "low"))
                .on(EventKind::SendPacket, Priority::Highest, "highest", recorder(&log, "highest"))
                .on(EventKind::SendPacket, Priority::Normal, "normal", recorder(&log, "normal")),
        );

        let _ = bus.publish(send_event());
        assert_eq!(*log.lock(), vec!["highest", "normal", "low"]);
    }

    #[test]
    fn equal_priorities_keep_registration_order() {
        let bus = EventBus::default();
        let log = Arc::new(Mutex::new(Vec::new()));
        let _ = bus.subscribe(
            ext("a"),
            Listener::new().on(EventKind::SendPacket, Priority::Normal, "first", recorder(&log, "first")),
        );
        let _ = bus.subscribe(
            ext("b"),
            Listener::new().on(EventKind::SendPacket, Priority::Normal, "second", recorder(&log, "second")),
        );

        let _ = bus.publish(send_event());
        assert_eq!(*log.lock(), vec!["first", "second"]);
    }

    #[test]
    fn cancel_without_propagation_stops_dispatch() {
        let bus = EventBus::default();
        let log = Arc::new(Mutex::new(Vec::new()));
        let _ = bus.subscribe(
            ext("a"),
            Listener::new()
                .on(EventKind::SendPacket, Priority::Highest, "gate", |event| {
                    event.cancel_and_stop();
                    Ok(())
                })
                .on(EventKind::SendPacket, Priority::Normal, "normal", recorder(&log, "normal"))
                .on(EventKind::SendPacket, Priority::Low, "low", recorder(&log, "low")),
        );

        let event = bus.publish(send_event());
        assert!(event.cancelled);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn cancel_with_propagation_runs_everyone() {
        let bus = EventBus::default();
        let log = Arc::new(Mutex::new(Vec::new()));
        let _ = bus.subscribe(
            ext("a"),
            Listener::new()
                .on(EventKind::SendPacket, Priority::Highest, "gate", |event| {
                    event.cancelled = true;
                    Ok(())
                })
                .on(EventKind::SendPacket, Priority::Normal, "normal", recorder(&log, "normal"))
                .on(EventKind::SendPacket, Priority::Low, "low", recorder(&log, "low")),
        );

        let event = bus.publish(send_event());
        assert!(event.cancelled);
        assert_eq!(*log.lock(), vec!["normal", "low"]);
    }

    #[test]
    fn broad_kinds_receive_narrow_events() {
        let bus = EventBus::default();
        let log = Arc::new(Mutex::new(Vec::new()));
        let _ = bus.subscribe(
            ext("a"),
            Listener::new()
                .on(EventKind::RawPacket, Priority::High, "raw", recorder(&log, "raw"))
                .on(EventKind::ExecPacket, Priority::Low, "exec", recorder(&log, "exec"))
                .on(EventKind::Lifecycle, Priority::Normal, "life", recorder(&log, "life")),
        );

        let _ = bus.publish(exec_event());
        assert_eq!(*log.lock(), vec!["raw", "exec"]);

        log.lock().clear();
        let _ = bus.publish(BridgeEvent::new(EventPayload::Online {
            hello: HelloPacket::default(),
            identify: IdentifySuccessPacket::default(),
        }));
        assert_eq!(*log.lock(), vec!["life"]);
    }

    #[test]
    fn failing_handlers_are_isolated() {
        let bus = EventBus::default();
        let log = Arc::new(Mutex::new(Vec::new()));
        let _ = bus.subscribe(
            ext("a"),
            Listener::new()
                .on(EventKind::SendPacket, Priority::Highest, "errs", |_| Err("nope".into()))
                .on(EventKind::SendPacket, Priority::High, "panics", |_| panic!("handler exploded"))
                .on(EventKind::SendPacket, Priority::Normal, "ok", recorder(&log, "ok")),
        );

        let _ = bus.publish(send_event());
        let _ = bus.publish(send_event());
        assert_eq!(*log.lock(), vec!["ok", "ok"]);
    }

    #[test]
    fn handlers_can_mutate_the_event() {
        let bus = EventBus::default();
        let _ = bus.subscribe(
            ext("a"),
            Listener::new()
                .on(EventKind::SendPacket, Priority::Normal, "rewrite", |event| {
                    if let Some(packet) = event.outbound_mut() {
                        packet["tag"] = json!("x");
                    }
                    Ok(())
                })
                .on(EventKind::ExecPacket, Priority::Normal, "skip", |event| {
                    event.skip_internal_processing = true;
                    Ok(())
                }),
        );

        let event = bus.publish(send_event());
        assert_matches::assert_matches!(
            event.payload,
            EventPayload::SendPacket { ref packet, .. } if packet["tag"] == "x"
        );
        assert!(bus.publish(exec_event()).skip_internal_processing);
    }

    #[test]
    fn invalid_handlers_are_skipped_without_aborting_batch() {
        let bus = EventBus::default();
        let id = bus.subscribe(
            ext("a"),
            Listener::new()
                .on_named("Teleport", Priority::Normal, "bad-kind", |_| Ok(()))
                .on(EventKind::SendPacket, Priority::Normal, "  ", |_| Ok(()))
                .on_named("send_packet", Priority::Normal, "good", |_| Ok(())),
        );
        assert!(id.is_some());
        assert_eq!(bus.handler_count(), 1);
        assert_eq!(bus.handler_names(EventKind::SendPacket), vec!["good"]);

        let none = bus.subscribe(
            ext("b"),
            Listener::new().on_named("Nope", Priority::Normal, "bad", |_| Ok(())),
        );
        assert!(none.is_none());
    }

    #[test]
    fn unsubscribe_removes_only_that_listener() {
        let bus = EventBus::default();
        let first = bus
            .subscribe(
                ext("a"),
                Listener::new()
                    .on(EventKind::SendPacket, Priority::Normal, "a1", |_| Ok(()))
                    .on(EventKind::Online, Priority::Normal, "a2", |_| Ok(())),
            )
            .unwrap();
        let _ = bus.subscribe(
            ext("a"),
            Listener::new().on(EventKind::SendPacket, Priority::Normal, "a3", |_| Ok(())),
        );

        assert_eq!(bus.unsubscribe(first), 2);
        assert_eq!(bus.handler_names(EventKind::SendPacket), vec!["a3"]);
        assert_eq!(bus.unsubscribe(first), 0);
    }

    #[test]
    fn unsubscribe_extension_removes_all_its_handlers() {
        let bus = EventBus::default();
        let _ = bus.subscribe(ext("a"), Listener::new().on(EventKind::SendPacket, Priority::Normal, "a1", |_| Ok(())));
        let _ = bus.subscribe(ext("a"), Listener::new().on(EventKind::Online, Priority::Normal, "a2", |_| Ok(())));
        let _ = bus.subscribe(ext("b"), Listener::new().on(EventKind::Online, Priority::Normal, "b1", |_| Ok(())));

        assert_eq!(bus.unsubscribe_extension("a"), 2);
        let ids: Vec<_> = bus.list_extensions().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["b"]);
    }

    #[test]
    fn list_extensions_is_distinct() {
        let bus = EventBus::default();
        let _ = bus.subscribe(ext("b"), Listener::new().on(EventKind::SendPacket, Priority::Normal, "x", |_| Ok(())));
        let _ = bus.subscribe(ext("a"), Listener::new().on(EventKind::SendPacket, Priority::Normal, "y", |_| Ok(())));
        let _ = bus.subscribe(ext("a"), Listener::new().on(EventKind::Online, Priority::Normal, "z", |_| Ok(())));
        let ids: Vec<_> = bus.list_extensions().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn handlers_may_subscribe_reentrantly() {
        let bus = Arc::new(EventBus::default());
        let inner = Arc::clone(&bus);
        let _ = bus.subscribe(
            ext("a"),
            Listener::new().on(EventKind::SendPacket, Priority::Normal, "spawner", move |_| {
                let _ = inner.subscribe(
                    ext("late"),
                    Listener::new().on(EventKind::Online, Priority::Normal, "late", |_| Ok(())),
                );
                Ok(())
            }),
        );

        let _ = bus.publish(send_event());
        assert_eq!(bus.handler_names(EventKind::Online), vec!["late"]);
    }

    #[tokio::test]
    async fn publish_async_returns_dispatched_event() {
        let bus = Arc::new(EventBus::new(1));
        let _ = bus.subscribe(
            ext("a"),
            Listener::new().on(EventKind::SendPacket, Priority::Normal, "cancel", |event| {
                event.cancelled = true;
                Ok(())
            }),
        );

        let first = bus.publish_async(send_event());
        let second = bus.publish_async(send_event());
        assert!(first.await.unwrap().unwrap().cancelled);
        assert!(second.await.unwrap().unwrap().cancelled);
    }

    #[tokio::test]
    async fn publish_async_on_works_from_foreign_thread() {
        let bus = Arc::new(EventBus::new(1));
        let _ = bus.subscribe(
            ext("a"),
            Listener::new().on(EventKind::SendPacket, Priority::Normal, "cancel", |event| {
                event.cancelled = true;
                Ok(())
            }),
        );

        let runtime = Handle::current();
        let publisher = Arc::clone(&bus);
        let handle = std::thread::spawn(move || publisher.publish_async_on(&runtime, send_event()))
            .join()
            .unwrap();
        assert!(handle.await.unwrap().unwrap().cancelled);
    }
}
