//! # parley-store
//!
//! Durable-storage collaborator boundary for the parley server.
//!
//! The core subsystem never talks to a database directly; it consumes the
//! [`Store`] trait (`get`/`put`/`update`/`delete`/`query_by_attribute`) and
//! the [`BlobStore`] trait (`upload`). Two `Store` implementations ship:
//!
//! - [`MemoryStore`] — `HashMap` behind a lock, for tests and development
//! - [`SqliteStore`] — single JSON-document table over a pooled `SQLite`
//!   connection, attribute queries via `json_extract`
//!
//! Records are plain JSON documents addressed by the key scheme in [`keys`].

#![deny(unsafe_code)]

pub mod blob;
pub mod errors;
pub mod keys;
pub mod memory;
pub mod merge;
pub mod sqlite;
pub mod store;

pub use blob::{BlobStore, MemoryBlobStore};
pub use errors::{Result, StoreError};
pub use memory::MemoryStore;
pub use merge::deep_merge;
pub use sqlite::{SqliteConfig, SqliteStore};
pub use store::Store;
