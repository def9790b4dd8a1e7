//! # parley-core
//!
//! Foundation types for the parley real-time messaging subsystem.
//!
//! This crate provides the shared vocabulary that the store and server
//! crates depend on:
//!
//! - **Branded IDs**: `UserId`, `SessionId`, `ConversationId`, `MessageId`
//!   as newtypes for type safety
//! - **Messages**: [`ChatMessage`] with denormalized sender snapshots and
//!   tombstone deletion
//! - **Presence**: [`PresenceStatus`] and the persisted [`PresenceRecord`]
//! - **Reactions**: per-(message, user) [`ReactionEntry`] and the snapshot
//!   map broadcast to rooms
//! - **Friends**: [`FriendRequest`] pending edges and symmetric
//!   [`FriendEdge`] pairs
//! - **Retry**: backoff math for best-effort store mirror writes

#![deny(unsafe_code)]

pub mod conversation;
pub mod friend;
pub mod ids;
pub mod message;
pub mod presence;
pub mod reaction;
pub mod retry;
pub mod user;

pub use conversation::Conversation;
pub use friend::{FriendEdge, FriendRequest};
pub use ids::{ConversationId, MessageId, SessionId, UserId};
pub use message::{ChatMessage, MessageKind, SenderSnapshot, DELETED_PLACEHOLDER};
pub use presence::{PresenceRecord, PresenceStatus};
pub use reaction::{ReactionEntry, ReactionSnapshot, ReactionValue};
pub use user::UserProfile;
