//! Keep-alive loop.

use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Counters reported when the loop stops.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeartbeatStats {
    /// Beats written to the socket.
    pub sent: u64,
    /// Ticks skipped because no socket was open.
    pub skipped: u64,
}

/// Beat every `interval` until `cancel` fires.
///
/// The first beat goes out immediately. `beat` returns whether the heartbeat
/// was handed to an open socket; `false` ticks are counted and otherwise
/// ignored.
pub async fn run_heartbeat<F>(interval: Duration, cancel: CancellationToken, mut beat: F) -> HeartbeatStats
where
    F: FnMut() -> bool + Send,
{
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut stats = HeartbeatStats::default();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(sent = stats.sent, skipped = stats.skipped, "heartbeat stopped");
                return stats;
            }
            _ = ticker.tick() => {
                if beat() {
                    stats.sent += 1;
                    trace!(sent = stats.sent, "heartbeat sent");
                } else {
                    stats.skipped += 1;
                }
            }
        }
    }
}
