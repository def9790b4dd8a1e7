//! Presence tracking: heartbeats, grace-period disconnects, stale sweep.
//!
//! Per user the tracker runs a three-state machine — Online,
//! GraceDisconnect, Offline — with two timer sources: a cancellable
//! per-user grace timer armed on disconnect, and one periodic sweep that
//! forces users with stale heartbeats offline. Both re-check live state at
//! fire time, so a reconnect racing an in-flight timer never produces a
//! spurious offline broadcast.
//!
//! The in-memory state is authoritative; the store record is a best-effort
//! mirror written through the async retry helper. Status changes are
//! broadcast to every connected session, and only on actual edges — a
//! heartbeat while online is silent.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use parley_core::retry::RetryConfig;
use parley_core::{PresenceRecord, PresenceStatus, UserId};
use parley_store::{keys, Store};

use crate::config::PresenceConfig;
use crate::events::{server, ServerEvent};
use crate::registry::ConnectionRegistry;
use crate::store_retry::spawn_store_retry;

enum Phase {
    Online,
    Grace { cancel: CancellationToken },
    Offline,
}

struct Entry {
    phase: Phase,
    last_active: DateTime<Utc>,
}

/// Heartbeat-driven presence state machine.
pub struct PresenceTracker {
    states: Mutex<HashMap<UserId, Entry>>,
    registry: Arc<ConnectionRegistry>,
    store: Arc<dyn Store>,
    grace: Duration,
    offline_after: Duration,
    retry: RetryConfig,
}

impl PresenceTracker {
    /// Create a tracker over the given registry and store mirror.
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        store: Arc<dyn Store>,
        config: &PresenceConfig,
        retry: RetryConfig,
    ) -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            registry,
            store,
            grace: Duration::from_secs(config.grace_secs),
            offline_after: Duration::from_secs(config.offline_after_secs),
            retry,
        }
    }

    /// A session of `user` connected.
    ///
    /// Broadcasts "online" only on the Offline→Online edge; a reconnect
    /// inside the grace window cancels the pending timer silently, and
    /// additional concurrent sessions change nothing.
    pub fn connected(self: &Arc<Self>, user: &UserId) {
        let now = Utc::now();
        let announce = {
            let mut states = self.states.lock();
            let entry = states.entry(user.clone()).or_insert(Entry {
                phase: Phase::Offline,
                last_active: now,
            });
            entry.last_active = now;
            match &entry.phase {
                Phase::Offline => {
                    entry.phase = Phase::Online;
                    true
                }
                Phase::Grace { cancel } => {
                    debug!(user_id = %user, "reconnect within grace window");
                    cancel.cancel();
                    entry.phase = Phase::Online;
                    false
                }
                Phase::Online => false,
            }
        };

        if announce {
            info!(user_id = %user, "user online");
            metrics::counter!("presence_transitions_total", "status" => "online").increment(1);
            self.announce(user, PresenceStatus::Online, now);
            self.mirror(PresenceRecord::online(user.clone()));
        }
    }

    /// Record user activity (any inbound frame counts as a heartbeat).
    pub fn activity(&self, user: &UserId) {
        if let Some(entry) = self.states.lock().get_mut(user) {
            entry.last_active = Utc::now();
        }
    }

    /// The last session of `user` disconnected.
    ///
    /// Arms the grace timer; if no session reconnects before it fires, the
    /// user goes offline. The timer re-checks the registry at fire time.
    pub fn disconnected(self: &Arc<Self>, user: &UserId) {
        if self.registry.is_connected(user) {
            return;
        }
        let cancel = CancellationToken::new();
        {
            let mut states = self.states.lock();
            let Some(entry) = states.get_mut(user) else {
                return;
            };
            if !matches!(entry.phase, Phase::Online) {
                return;
            }
            entry.phase = Phase::Grace {
                cancel: cancel.clone(),
            };
        }
        debug!(user_id = %user, grace = ?self.grace, "grace timer armed");

        let tracker = Arc::clone(self);
        let user = user.clone();
        let grace = self.grace;
        let _handle = tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(grace) => tracker.grace_expired(&user),
                () = cancel.cancelled() => {}
            }
        });
    }

    /// Explicit status announcement (`user-status` event).
    pub fn set_status(self: &Arc<Self>, user: &UserId, status: PresenceStatus) {
        match status {
            PresenceStatus::Online => self.connected(user),
            PresenceStatus::Offline => {
                let went_offline = {
                    let mut states = self.states.lock();
                    match states.get_mut(user) {
                        Some(entry) if !matches!(entry.phase, Phase::Offline) => {
                            if let Phase::Grace { cancel } = &entry.phase {
                                cancel.cancel();
                            }
                            entry.phase = Phase::Offline;
                            Some(entry.last_active)
                        }
                        _ => None,
                    }
                };
                if let Some(last_active) = went_offline {
                    self.finish_offline(user, last_active);
                }
            }
        }
    }

    /// Whether the user is currently online (grace counts as online —
    /// other members must not observe the blip).
    pub fn is_online(&self, user: &UserId) -> bool {
        self.states
            .lock()
            .get(user)
            .is_some_and(|e| !matches!(e.phase, Phase::Offline))
    }

    /// Number of users currently online.
    pub fn online_count(&self) -> usize {
        self.states
            .lock()
            .values()
            .filter(|e| !matches!(e.phase, Phase::Offline))
            .count()
    }

    /// One pass of the stale-heartbeat sweep.
    ///
    /// Every Online user whose freshest session heartbeat is older than the
    /// timeout goes offline through the same persist+broadcast path as a
    /// grace expiry, exactly once; their zombie sessions are evicted.
    pub fn sweep(self: &Arc<Self>) {
        let mut stale = Vec::new();
        {
            let mut states = self.states.lock();
            for (user, entry) in states.iter_mut() {
                if !matches!(entry.phase, Phase::Online) {
                    continue;
                }
                let sessions = self.registry.lookup(user);
                let freshest = sessions.iter().map(|s| s.heartbeat_age()).min();
                let expired = match freshest {
                    Some(age) => age > self.offline_after,
                    // Online with no sessions should not happen; reap it.
                    None => true,
                };
                if expired {
                    entry.phase = Phase::Offline;
                    stale.push((user.clone(), entry.last_active, sessions));
                }
            }
        }

        for (user, last_active, sessions) in stale {
            warn!(user_id = %user, "heartbeat timeout, forcing offline");
            for session in sessions {
                session.evict();
            }
            self.finish_offline(&user, last_active);
        }
    }

    /// Run the periodic sweep until cancelled.
    pub async fn run_sweeper(self: Arc<Self>, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        // Skip the immediate first tick
        let _ = ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => self.sweep(),
                () = cancel.cancelled() => {
                    debug!("presence sweeper stopped");
                    return;
                }
            }
        }
    }

    /// Grace timer fired; re-check live state before going offline.
    fn grace_expired(self: &Arc<Self>, user: &UserId) {
        let went_offline = {
            let mut states = self.states.lock();
            match states.get_mut(user) {
                // A reconnect raced the timer: phase is no longer Grace.
                Some(entry) if matches!(entry.phase, Phase::Grace { .. }) => {
                    if self.registry.is_connected(user) {
                        entry.phase = Phase::Online;
                        None
                    } else {
                        entry.phase = Phase::Offline;
                        Some(entry.last_active)
                    }
                }
                _ => None,
            }
        };

        if let Some(last_active) = went_offline {
            self.finish_offline(user, last_active);
        }
    }

    /// Shared Offline tail: broadcast the edge and mirror the record.
    fn finish_offline(self: &Arc<Self>, user: &UserId, last_active: DateTime<Utc>) {
        info!(user_id = %user, "user offline");
        metrics::counter!("presence_transitions_total", "status" => "offline").increment(1);
        self.announce(user, PresenceStatus::Offline, last_active);
        self.mirror(PresenceRecord::offline(user.clone(), last_active));
    }

    fn announce(&self, user: &UserId, status: PresenceStatus, last_active: DateTime<Utc>) {
        let event = ServerEvent::new(
            server::USER_STATUS_CHANGE,
            json!({
                "userId": user,
                "status": status,
                "lastActive": last_active,
            }),
        );
        let _ = self.registry.broadcast_all(&event);
    }

    /// Best-effort mirror write, retried in the background.
    fn mirror(&self, record: PresenceRecord) {
        let store = Arc::clone(&self.store);
        let key = keys::presence(&record.user_id);
        let value = match serde_json::to_value(&record) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "presence record not serializable");
                return;
            }
        };
        let _handle = spawn_store_retry("presence_mirror", self.retry.clone(), move || {
            let store = Arc::clone(&store);
            let key = key.clone();
            let value = value.clone();
            async move { store.put(&key, value).await }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::connection::SessionHandle;
    use parley_store::MemoryStore;
    use tokio::sync::mpsc;

    struct Fixture {
        registry: Arc<ConnectionRegistry>,
        store: Arc<MemoryStore>,
        tracker: Arc<PresenceTracker>,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(ConnectionRegistry::new());
        let store = Arc::new(MemoryStore::new());
        let tracker = Arc::new(PresenceTracker::new(
            registry.clone(),
            store.clone() as Arc<dyn Store>,
            &PresenceConfig::default(),
            RetryConfig::default(),
        ));
        Fixture {
            registry,
            store,
            tracker,
        }
    }

    fn connect(fx: &Fixture, user: &str) -> (Arc<SessionHandle>, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(64);
        let handle = Arc::new(SessionHandle::new(UserId::from(user), tx, 64));
        fx.registry.register(handle.clone());
        fx.tracker.connected(&UserId::from(user));
        (handle, rx)
    }

    fn disconnect(fx: &Fixture, handle: &Arc<SessionHandle>) {
        let _ = fx.registry.unregister(&handle.id);
        fx.tracker.disconnected(&handle.user_id);
    }

    /// Drain status-change frames about `user` from an observer channel.
    fn status_events(rx: &mut mpsc::Receiver<Arc<String>>, user: &str) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(raw) = rx.try_recv() {
            let v: serde_json::Value = serde_json::from_str(&raw).unwrap();
            if v["type"] == "user-status-change" && v["data"]["userId"] == user {
                out.push(v["data"]["status"].as_str().unwrap().to_owned());
            }
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn online_broadcast_only_on_edge() {
        let fx = fixture();
        let (_observer, mut obs_rx) = connect(&fx, "watcher");

        let (_s1, _rx1) = connect(&fx, "u1");
        assert_eq!(status_events(&mut obs_rx, "u1"), vec!["online"]);

        // Second concurrent session: no new broadcast
        let (_s2, _rx2) = connect(&fx, "u1");
        assert!(status_events(&mut obs_rx, "u1").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_within_grace_suppresses_offline() {
        let fx = fixture();
        let (_observer, mut obs_rx) = connect(&fx, "watcher");
        let (s1, _rx1) = connect(&fx, "u1");
        let _ = status_events(&mut obs_rx, "u1");

        disconnect(&fx, &s1);
        // Reconnect after 2s, inside the 5s grace window
        tokio::time::sleep(Duration::from_secs(2)).await;
        let (_s2, _rx2) = connect(&fx, "u1");

        // Let any stray timer fire
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(status_events(&mut obs_rx, "u1").is_empty());
        assert!(fx.tracker.is_online(&UserId::from("u1")));
    }

    #[tokio::test(start_paused = true)]
    async fn grace_expiry_broadcasts_offline_once() {
        let fx = fixture();
        let (_observer, mut obs_rx) = connect(&fx, "watcher");
        let (s1, _rx1) = connect(&fx, "u1");
        let _ = status_events(&mut obs_rx, "u1");

        disconnect(&fx, &s1);
        tokio::time::sleep(Duration::from_secs(6)).await;

        assert_eq!(status_events(&mut obs_rx, "u1"), vec!["offline"]);
        assert!(!fx.tracker.is_online(&UserId::from("u1")));

        // Mirror record written
        let record = fx.store.get("presence:u1").await.unwrap().unwrap();
        assert_eq!(record["status"], "offline");
    }

    #[tokio::test(start_paused = true)]
    async fn second_session_keeps_user_online_through_disconnect() {
        let fx = fixture();
        let (_observer, mut obs_rx) = connect(&fx, "watcher");
        let (s1, _rx1) = connect(&fx, "u1");
        let (_s2, _rx2) = connect(&fx, "u1");
        let _ = status_events(&mut obs_rx, "u1");

        disconnect(&fx, &s1);
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(status_events(&mut obs_rx, "u1").is_empty());
        assert!(fx.tracker.is_online(&UserId::from("u1")));
    }

    #[tokio::test(start_paused = true)]
    async fn offline_then_reconnect_announces_again() {
        let fx = fixture();
        let (_observer, mut obs_rx) = connect(&fx, "watcher");
        let (s1, _rx1) = connect(&fx, "u1");
        let _ = status_events(&mut obs_rx, "u1");

        disconnect(&fx, &s1);
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(status_events(&mut obs_rx, "u1"), vec!["offline"]);

        let (_s2, _rx2) = connect(&fx, "u1");
        assert_eq!(status_events(&mut obs_rx, "u1"), vec!["online"]);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_forces_stale_user_offline_exactly_once() {
        let fx = fixture();
        let (observer, mut obs_rx) = connect(&fx, "watcher");
        let (s1, _rx1) = connect(&fx, "u1");
        let _ = status_events(&mut obs_rx, "u1");

        // 125s without heartbeats against a 120s timeout; keep the
        // observer fresh so only u1 expires.
        tokio::time::sleep(Duration::from_secs(125)).await;
        fx.registry.touch(&observer.id);

        fx.tracker.sweep();
        assert_eq!(status_events(&mut obs_rx, "u1"), vec!["offline"]);
        assert!(s1.cancel_token().is_cancelled());

        // Repeated sweeps never re-fire for an already-offline user
        fx.tracker.sweep();
        fx.tracker.sweep();
        assert!(status_events(&mut obs_rx, "u1").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_spares_fresh_heartbeats() {
        let fx = fixture();
        let (observer, mut obs_rx) = connect(&fx, "watcher");
        let (s1, _rx1) = connect(&fx, "u1");
        let _ = status_events(&mut obs_rx, "u1");

        tokio::time::sleep(Duration::from_secs(60)).await;
        fx.registry.touch(&s1.id);
        fx.registry.touch(&observer.id);
        tokio::time::sleep(Duration::from_secs(61)).await;

        // u1's heartbeat is 61s old — under the 120s threshold
        fx.tracker.sweep();
        assert!(status_events(&mut obs_rx, "u1").is_empty());
        assert!(fx.tracker.is_online(&UserId::from("u1")));
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_task_runs_on_interval() {
        let fx = fixture();
        let (_observer, mut obs_rx) = connect(&fx, "watcher");
        let (_s1, _rx1) = connect(&fx, "u1");
        let _ = status_events(&mut obs_rx, "u1");

        let cancel = CancellationToken::new();
        let sweeper = tokio::spawn(
            fx.tracker
                .clone()
                .run_sweeper(Duration::from_secs(30), cancel.clone()),
        );

        // After 155s of silence both users' heartbeats exceed 120s, so the
        // scheduled sweep at t=150 has fired before the test wakes.
        tokio::time::sleep(Duration::from_secs(155)).await;
        assert_eq!(status_events(&mut obs_rx, "u1"), vec!["offline"]);

        cancel.cancel();
        sweeper.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_offline_status_broadcasts() {
        let fx = fixture();
        let (_observer, mut obs_rx) = connect(&fx, "watcher");
        let (_s1, _rx1) = connect(&fx, "u1");
        let _ = status_events(&mut obs_rx, "u1");

        fx.tracker
            .set_status(&UserId::from("u1"), PresenceStatus::Offline);
        assert_eq!(status_events(&mut obs_rx, "u1"), vec!["offline"]);

        // Repeating it is silent
        fx.tracker
            .set_status(&UserId::from("u1"), PresenceStatus::Offline);
        assert!(status_events(&mut obs_rx, "u1").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn online_count_tracks_transitions() {
        let fx = fixture();
        let (s1, _rx1) = connect(&fx, "u1");
        let (_s2, _rx2) = connect(&fx, "u2");
        assert_eq!(fx.tracker.online_count(), 2);

        disconnect(&fx, &s1);
        // Grace still counts as online
        assert_eq!(fx.tracker.online_count(), 2);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(fx.tracker.online_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn mirror_write_lands_in_store() {
        let fx = fixture();
        let (_s1, _rx1) = connect(&fx, "u1");
        tokio::task::yield_now().await;

        let record = fx.store.get("presence:u1").await.unwrap().unwrap();
        assert_eq!(record["status"], "online");
        assert_eq!(record["userId"], "u1");
    }
}
