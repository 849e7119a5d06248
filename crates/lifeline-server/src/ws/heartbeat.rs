//! Heartbeat liveness monitoring.
//!
//! Ping frames are written by the session's outbound task; this loop only
//! watches the alive flag that Pong frames (and inbound traffic) refresh.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;

use super::connection::ClientConnection;

/// Outcome of the heartbeat loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// The client stopped responding within the timeout window.
    TimedOut,
    /// The heartbeat was cancelled externally.
    Cancelled,
}

/// Run heartbeat liveness checks for a connection.
///
/// At each `interval` tick the alive flag is checked and reset. If the client
/// has not responded since the last tick the missed counter increments; once
/// `timeout / interval` consecutive misses accumulate the connection is
/// considered dead and [`HeartbeatResult::TimedOut`] is returned.
pub async fn run_heartbeat(
    connection: Arc<ClientConnection>,
    interval: Duration,
    timeout: Duration,
    cancel: CancellationToken,
) -> HeartbeatResult {
    let mut check_interval = time::interval(interval);
    let mut missed: u32 = 0;
    let interval_ms = interval.as_millis().max(1);
    #[allow(clippy::cast_possible_truncation)]
    let max_missed = (timeout.as_millis() / interval_ms).max(1) as u32;

    loop {
        tokio::select! {
            _ = check_interval.tick() => {
                // check_alive swaps the flag to false; a pong before the
                // next tick sets it again.
                if connection.check_alive() {
                    missed = 0;
                } else {
                    missed += 1;
                    if missed >= max_missed {
                        return HeartbeatResult::TimedOut;
                    }
                }
            }
            () = cancel.cancelled() => {
                return HeartbeatResult::Cancelled;
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
