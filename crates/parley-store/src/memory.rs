//! In-memory store for tests and development.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use crate::errors::{Result, StoreError};
use crate::merge::deep_merge;
use crate::store::Store;

/// `Store` backed by a map. Keys iterate in insertion-independent sorted
/// order, which keeps query results stable for tests.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<String, Value>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.records.read().get(key).cloned())
    }

    async fn put(&self, key: &str, value: Value) -> Result<()> {
        let _ = self.records.write().insert(key.to_owned(), value);
        Ok(())
    }

    async fn update(&self, key: &str, patch: Value) -> Result<Value> {
        let mut records = self.records.write();
        let Some(existing) = records.remove(key) else {
            return Err(StoreError::KeyNotFound(key.to_owned()));
        };
        let merged = deep_merge(existing, patch);
        let _ = records.insert(key.to_owned(), merged.clone());
        Ok(merged)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        if self.records.write().remove(key).is_none() {
            return Err(StoreError::KeyNotFound(key.to_owned()));
        }
        Ok(())
    }

    async fn query_by_attribute(&self, attr: &str, value: &str) -> Result<Vec<Value>> {
        let records = self.records.read();
        Ok(records
            .values()
            .filter(|v| v.get(attr).and_then(Value::as_str) == Some(value))
            .cloned()
            .collect())
    }
}
