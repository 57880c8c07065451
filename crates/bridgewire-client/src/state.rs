//! Connection state machine.
//!
//! All transitions go through one mutex so that `Connecting` and the
//! connected states never overlap. Every successful open bumps the
//! generation; close and error signals carry the generation they belong to
//! and are ignored once it is stale.

use std::fmt;

use parking_lot::Mutex;

/// Lifecycle state of the single connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No socket and no attempt in progress.
    Disconnected,
    /// An open attempt is in progress.
    Connecting,
    /// Socket open, waiting for `Hello`.
    Connected,
    /// `Identify` sent, waiting for `IdentifySuccess`.
    Identifying,
    /// Handshake complete.
    Ready,
    /// Terminal.
    ShuttingDown,
}

impl ConnectionState {
    /// Whether a socket is open.
    #[must_use]
    pub fn is_open(self) -> bool {
        matches!(self, Self::Connected | Self::Identifying | Self::Ready)
    }

    /// Name used in logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Identifying => "identifying",
            Self::Ready => "ready",
            Self::ShuttingDown => "shutting_down",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct Inner {
    state: ConnectionState,
    generation: u64,
}

/// Mutex-guarded connection state plus generation counter.
#[derive(Debug)]
pub struct ConnectionStateMachine {
    inner: Mutex<Inner>,
}

impl ConnectionStateMachine {
    /// Start in [`ConnectionState::Disconnected`] at generation 0.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: ConnectionState::Disconnected,
                generation: 0,
            }),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    /// Generation of the most recent open.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    /// Whether `generation` is the live, open connection.
    #[must_use]
    pub fn is_current(&self, generation: u64) -> bool {
        let inner = self.inner.lock();
        inner.generation == generation && inner.state.is_open()
    }

    /// `Disconnected -> Connecting`. False in any other state.
    pub fn begin_connect(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state == ConnectionState::Disconnected {
            inner.state = ConnectionState::Connecting;
            true
        } else {
            false
        }
    }

    /// `Connecting -> Disconnected` after a failed open.
    pub fn connect_failed(&self) {
        let mut inner = self.inner.lock();
        if inner.state == ConnectionState::Connecting {
            inner.state = ConnectionState::Disconnected;
        }
    }

    /// `Connecting -> Connected`. Returns the new generation, or `None` when
    /// the attempt was overtaken by shutdown.
    pub fn opened(&self) -> Option<u64> {
        let mut inner = self.inner.lock();
        if inner.state != ConnectionState::Connecting {
            return None;
        }
        inner.generation += 1;
        inner.state = ConnectionState::Connected;
        Some(inner.generation)
    }

    /// `Connected -> Identifying` for the current generation.
    pub fn identifying(&self, generation: u64) -> bool {
        self.advance(generation, ConnectionState::Connected, ConnectionState::Identifying)
    }

    /// `Identifying -> Ready` for the current generation. A server that
    /// accepts without waiting for `Identify` moves `Connected -> Ready`.
    pub fn ready(&self, generation: u64) -> bool {
        self.advance(generation, ConnectionState::Identifying, ConnectionState::Ready)
            || self.advance(generation, ConnectionState::Connected, ConnectionState::Ready)
    }

    /// Back to `Disconnected` after close or error.
    ///
    /// Only the first call for the live generation succeeds; repeated or
    /// stale signals and signals during shutdown return `false`.
    pub fn reset(&self, generation: u64) -> bool {
        let mut inner = self.inner.lock();
        if inner.generation != generation || !inner.state.is_open() {
            return false;
        }
        inner.state = ConnectionState::Disconnected;
        true
    }

    /// Enter the terminal state. Returns `false` if already shutting down.
    pub fn shut_down(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state == ConnectionState::ShuttingDown {
            return false;
        }
        inner.state = ConnectionState::ShuttingDown;
        true
    }

    /// Whether [`ConnectionStateMachine::shut_down`] was called.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.state() == ConnectionState::ShuttingDown
    }

    fn advance(&self, generation: u64, from: ConnectionState, to: ConnectionState) -> bool {
        let mut inner = self.inner.lock();
        if inner.generation == generation && inner.state == from {
            inner.state = to;
            true
        } else {
            false
        }
    }
}

impl Default for ConnectionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ready_machine() -> (ConnectionStateMachine, u64) {
        let sm = ConnectionStateMachine::new();
        assert!(sm.begin_connect());
        let generation = sm.opened().unwrap();
        assert!(sm.identifying(generation));
        assert!(sm.ready(generation));
        (sm, generation)
    }

    #[test]
    fn happy_path() {
        let (sm, generation) = ready_machine();
        assert_eq!(generation, 1);
        assert_eq!(sm.state(), ConnectionState::Ready);
        assert!(sm.is_current(1));
    }

    #[test]
    fn connecting_excludes_second_attempt() {
        let sm = ConnectionStateMachine::new();
        assert!(sm.begin_connect());
        assert!(!sm.begin_connect());
        let _ = sm.opened();
        assert!(!sm.begin_connect());
    }

    #[test]
    fn ready_without_identifying() {
        let sm = ConnectionStateMachine::new();
        assert!(sm.begin_connect());
        let generation = sm.opened().unwrap();
        assert!(sm.ready(generation));
        assert!(!sm.ready(generation));
        assert_eq!(sm.state(), ConnectionState::Ready);
    }

    #[test]
    fn failed_open_returns_to_disconnected() {
        let sm = ConnectionStateMachine::new();
        assert!(sm.begin_connect());
        sm.connect_failed();
        assert_eq!(sm.state(), ConnectionState::Disconnected);
        assert_eq!(sm.generation(), 0);
    }

    #[test]
    fn reset_only_once_per_generation() {
        let (sm, generation) = ready_machine();
        assert!(sm.reset(generation));
        assert!(!sm.reset(generation));
        assert_eq!(sm.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn stale_generation_is_ignored() {
        let (sm, first) = ready_machine();
        assert!(sm.reset(first));
        assert!(sm.begin_connect());
        let second = sm.opened().unwrap();
        assert_eq!(second, 2);
        assert!(!sm.reset(first));
        assert!(!sm.identifying(first));
        assert_eq!(sm.state(), ConnectionState::Connected);
    }

    #[test]
    fn shutdown_is_terminal() {
        let (sm, generation) = ready_machine();
        assert!(sm.shut_down());
        assert!(!sm.shut_down());
        assert!(!sm.reset(generation));
        assert!(!sm.begin_connect());
        assert!(sm.opened().is_none());
        assert!(sm.is_shutting_down());
    }

    #[test]
    fn shutdown_overtakes_pending_open() {
        let sm = ConnectionStateMachine::new();
        assert!(sm.begin_connect());
        assert!(sm.shut_down());
        assert!(sm.opened().is_none());
    }

    #[test]
    fn concurrent_resets_succeed_once() {
        let (sm, generation) = ready_machine();
        let sm = Arc::new(sm);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let sm = Arc::clone(&sm);
                std::thread::spawn(move || sm.reset(generation))
            })
            .collect();
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(wins, 1);
    }
}
