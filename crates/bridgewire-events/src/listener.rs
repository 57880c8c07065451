//! Listener builder: the set of handlers an extension subscribes in one call.

use std::fmt;
use std::sync::Arc;

use crate::errors::{EventError, HandlerError};
use crate::event::BridgeEvent;
use crate::kind::{EventKind, Priority};

/// Handler callback.
pub type EventCallback =
    Arc<dyn Fn(&mut BridgeEvent) -> Result<(), HandlerError> + Send + Sync + 'static>;

/// Kind a handler subscribes to, either typed or by name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KindTarget {
    /// Checked at compile time.
    Typed(EventKind),
    /// Checked at registration.
    Named(String),
}

impl KindTarget {
    /// Resolve to a kind.
    pub fn resolve(&self) -> Result<EventKind, EventError> {
        match self {
            Self::Typed(kind) => Ok(*kind),
            Self::Named(name) => name.parse(),
        }
    }
}

/// One handler declared by a listener.
#[derive(Clone)]
pub struct HandlerSpec {
    /// Name used in logs.
    pub name: String,
    /// Kind subscribed to.
    pub target: KindTarget,
    /// Dispatch priority.
    pub priority: Priority,
    /// Callback.
    pub callback: EventCallback,
}

impl fmt::Debug for HandlerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerSpec")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// A batch of handlers registered together and removed together.
#[derive(Clone, Debug, Default)]
pub struct Listener {
    handlers: Vec<HandlerSpec>,
}

impl Listener {
    /// Create an empty listener.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler for a typed kind.
    #[must_use]
    pub fn on<F>(self, kind: EventKind, priority: Priority, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut BridgeEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.with_target(KindTarget::Typed(kind), priority, name, f)
    }

    /// Add a handler for a kind given by name.
    #[must_use]
    pub fn on_named<F>(
        self,
        kind: impl Into<String>,
        priority: Priority,
        name: impl Into<String>,
        f: F,
    ) -> Self
    where
        F: Fn(&mut BridgeEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.with_target(KindTarget::Named(kind.into()), priority, name, f)
    }

    fn with_target<F>(
        mut self,
        target: KindTarget,
        priority: Priority,
        name: impl Into<String>,
        f: F,
    ) -> Self
    where
        F: Fn(&mut BridgeEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.handlers.push(HandlerSpec {
            name: name.into(),
            target,
            priority,
            callback: Arc::new(f),
        });
        self
    }

    /// Declared handlers.
    #[must_use]
    pub fn handlers(&self) -> &[HandlerSpec] {
        &self.handlers
    }

    /// Consume into the declared handlers.
    #[must_use]
    pub fn into_handlers(self) -> Vec<HandlerSpec> {
        self.handlers
    }

    /// Number of declared handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handler was declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
