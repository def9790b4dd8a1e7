//! Live session state for one WebSocket connection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
// tokio's Instant so paused-time tests can age heartbeats deterministically
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use parley_core::{SessionId, UserId};

use crate::events::ServerEvent;

/// One live connection belonging to a user.
///
/// Owned by the connection registry from `register` to `unregister`. The
/// outbound channel is bounded; writes never block and a session that keeps
/// dropping frames is cancelled rather than allowed to stall the sender
/// (see [`SessionHandle::send_raw`]).
pub struct SessionHandle {
    /// Unique session id.
    pub id: SessionId,
    /// The connected user.
    pub user_id: UserId,
    /// Send half of the outbound channel to the socket write task.
    tx: mpsc::Sender<Arc<String>>,
    /// When this session connected.
    pub connected_at: Instant,
    /// When the last heartbeat (frame, ping or pong) arrived.
    last_heartbeat: Mutex<Instant>,
    /// Frames dropped because the outbound channel was full or closed.
    dropped_frames: AtomicU64,
    /// Frames a session may drop before eviction.
    drop_budget: u64,
    /// Cancelled to force-disconnect this session.
    cancel: CancellationToken,
}

impl SessionHandle {
    /// Create a handle with a fresh session id.
    pub fn new(user_id: UserId, tx: mpsc::Sender<Arc<String>>, drop_budget: u64) -> Self {
        let now = Instant::now();
        Self {
            id: SessionId::new(),
            user_id,
            tx,
            connected_at: now,
            last_heartbeat: Mutex::new(now),
            dropped_frames: AtomicU64::new(0),
            drop_budget,
            cancel: CancellationToken::new(),
        }
    }

    /// Enqueue a pre-serialized frame without blocking.
    ///
    /// Returns `false` if the frame was dropped. Exceeding the drop budget
    /// cancels the session — a stalled consumer is disconnected, not waited
    /// for.
    pub fn send_raw(&self, frame: Arc<String>) -> bool {
        if self.tx.try_send(frame).is_ok() {
            return true;
        }
        let dropped = self.dropped_frames.fetch_add(1, Ordering::Relaxed) + 1;
        metrics::counter!("ws_frames_dropped_total").increment(1);
        if dropped >= self.drop_budget && !self.cancel.is_cancelled() {
            tracing::warn!(
                session_id = %self.id,
                user_id = %self.user_id,
                dropped,
                "drop budget exhausted, evicting slow consumer"
            );
            self.cancel.cancel();
        }
        false
    }

    /// Serialize and enqueue an event.
    pub fn send_event(&self, event: &ServerEvent) -> bool {
        match event.to_json() {
            Some(json) => self.send_raw(json),
            None => false,
        }
    }

    /// Refresh the heartbeat timestamp.
    pub fn touch(&self) {
        *self.last_heartbeat.lock() = Instant::now();
    }

    /// Age of the most recent heartbeat.
    pub fn heartbeat_age(&self) -> Duration {
        self.last_heartbeat.lock().elapsed()
    }

    /// Frames dropped so far.
    pub fn dropped(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    /// Token cancelled when the session must disconnect.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Force-disconnect this session.
    pub fn evict(&self) {
        self.cancel.cancel();
    }
}
