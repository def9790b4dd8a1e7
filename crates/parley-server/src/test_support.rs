//! Shared fixtures for unit tests: a fully wired component stack over the
//! in-memory store.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;

use parley_core::retry::RetryConfig;
use parley_core::{Conversation, ConversationId, UserId};
use parley_store::{keys, MemoryStore, Store};

use crate::config::PresenceConfig;
use crate::dispatch::EventContext;
use crate::fanout::ConversationService;
use crate::friends::FriendService;
use crate::presence::PresenceTracker;
use crate::reactions::ReactionService;
use crate::registry::ConnectionRegistry;
use crate::rooms::RoomRegistry;
use crate::ws::connection::SessionHandle;

/// A wired-up component stack plus helpers to connect fake sessions.
pub struct TestHarness {
    /// Connection registry.
    pub registry: Arc<ConnectionRegistry>,
    /// Room membership.
    pub rooms: Arc<RoomRegistry>,
    /// Presence tracker.
    pub presence: Arc<PresenceTracker>,
    /// Backing in-memory store.
    pub store: Arc<MemoryStore>,
    ctx: EventContext,
}

impl TestHarness {
    /// Build the full stack with default timings.
    pub fn new() -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let rooms = Arc::new(RoomRegistry::new(registry.clone()));
        let store = Arc::new(MemoryStore::new());
        let dyn_store: Arc<dyn Store> = store.clone();
        let presence = Arc::new(PresenceTracker::new(
            registry.clone(),
            dyn_store.clone(),
            &PresenceConfig::default(),
            RetryConfig::default(),
        ));
        let conversations = Arc::new(ConversationService::new(
            rooms.clone(),
            dyn_store.clone(),
            RetryConfig::default(),
        ));
        let reactions = Arc::new(ReactionService::new(rooms.clone(), dyn_store.clone()));
        let friends = Arc::new(FriendService::new(registry.clone(), dyn_store));

        let ctx = EventContext {
            registry: registry.clone(),
            rooms: rooms.clone(),
            presence: presence.clone(),
            conversations,
            reactions,
            friends,
        };
        Self {
            registry,
            rooms,
            presence,
            store,
            ctx,
        }
    }

    /// The dispatch context.
    pub fn ctx(&self) -> &EventContext {
        &self.ctx
    }

    /// Register a fake session for `user` and mark them connected.
    ///
    /// The session's own presence broadcast is drained so tests start from
    /// a clean channel.
    pub fn connect(&self, user: &str) -> (Arc<SessionHandle>, mpsc::Receiver<Arc<String>>) {
        let (tx, mut rx) = mpsc::channel(64);
        let handle = Arc::new(SessionHandle::new(UserId::from(user), tx, 64));
        self.registry.register(handle.clone());
        self.presence.connected(&UserId::from(user));
        while rx.try_recv().is_ok() {}
        (handle, rx)
    }

    /// Seed a conversation record with a fixed id and participant list.
    pub async fn seed_conversation(&self, id: &str, participants: &[&str]) {
        let conversation = Conversation {
            id: ConversationId::from(id),
            name: None,
            participants: participants.iter().map(|u| UserId::from(*u)).collect(),
            created_at: Utc::now(),
        };
        self.store
            .put(
                &keys::conversation(&conversation.id),
                serde_json::to_value(&conversation).unwrap(),
            )
            .await
            .unwrap();
    }
}

/// Drain and parse every frame currently queued on a session channel.
pub fn drain_frames(rx: &mut mpsc::Receiver<Arc<String>>) -> Vec<serde_json::Value> {
    let mut out = Vec::new();
    while let Ok(raw) = rx.try_recv() {
        out.push(serde_json::from_str(&raw).unwrap());
    }
    out
}
