//! The durable-store collaborator trait.

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::Result;

/// Generic durable record storage consumed by the core subsystem.
///
/// Records are JSON documents addressed by string keys (see [`crate::keys`]
/// for the key scheme). Attribute queries match a top-level string field
/// across all records, which is how the read sides that span keys (message
/// history, reaction snapshots, pending requests) are served.
#[async_trait]
pub trait Store: Send + Sync {
    /// Fetch a record, `None` if the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Create or replace a record.
    async fn put(&self, key: &str, value: Value) -> Result<()>;

    /// Deep-merge `patch` into an existing record and return the result.
    ///
    /// Fails with [`crate::StoreError::KeyNotFound`] when the key is absent.
    async fn update(&self, key: &str, patch: Value) -> Result<Value>;

    /// Delete a record.
    ///
    /// Fails with [`crate::StoreError::KeyNotFound`] when the key is absent,
    /// so callers can distinguish a no-op from a removal.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Return every record whose top-level `attr` field equals `value`.
    async fn query_by_attribute(&self, attr: &str, value: &str) -> Result<Vec<Value>>;
}
