//! Blob-store collaborator boundary.
//!
//! Attachment upload flows live outside the core subsystem; the core only
//! carries the resulting URL inside message content. The trait is defined
//! here so those flows have a seam, with an in-memory implementation for
//! tests.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::errors::{Result, StoreError};

/// Object storage for message attachments.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `path` and return a fetchable URL.
    async fn upload(&self, bytes: Vec<u8>, path: &str) -> Result<String>;
}

/// `BlobStore` holding blobs in memory, addressable as `mem://` URLs.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    /// Create an empty blob store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch previously uploaded bytes by path (test helper).
    pub fn fetch(&self, path: &str) -> Option<Vec<u8>> {
        self.blobs.read().get(path).cloned()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, bytes: Vec<u8>, path: &str) -> Result<String> {
        if path.is_empty() {
            return Err(StoreError::Unavailable("empty blob path".into()));
        }
        let _ = self.blobs.write().insert(path.to_owned(), bytes);
        Ok(format!("mem://{path}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_returns_url() {
        let blobs = MemoryBlobStore::new();
        let url = blobs.upload(vec![1, 2, 3], "avatars/u1.png").await.unwrap();
        assert_eq!(url, "mem://avatars/u1.png");
        assert_eq!(blobs.fetch("avatars/u1.png").unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn empty_path_rejected() {
        let blobs = MemoryBlobStore::new();
        assert!(blobs.upload(vec![], "").await.is_err());
    }
}
