//! In-memory blob store (for development/testing).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;

use crate::client::FetchError;
use crate::store::{BlobStore, StoreError, StoreResult};

/// Process-local blob store.
///
/// Can be switched into an unavailable mode to exercise failure handling.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Bytes>>,
    unavailable: AtomicBool,
}

impl MemoryBlobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .blobs
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Read a blob synchronously, bypassing the unavailable switch.
    pub fn peek(&self, key: &str) -> Option<Bytes> {
        self.blobs
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(FetchError::Connection(
                "memory store marked unavailable".to_string(),
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        self.check_available()?;
        Ok(self.peek(key))
    }

    async fn set(&self, key: &str, value: Bytes) -> StoreResult<()> {
        self.check_available()?;
        self.blobs
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_then_get() {
        let store = MemoryBlobStore::new();
        store.set("a", Bytes::from_static(b"1")).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some(Bytes::from_static(b"1")));
        assert_eq!(store.get("b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let store = MemoryBlobStore::new();
        store.set("a", Bytes::from_static(b"1")).await.unwrap();
        store.set("a", Bytes::from_static(b"2")).await.unwrap();
        assert_eq!(store.peek("a"), Some(Bytes::from_static(b"2")));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_calls() {
        let store = MemoryBlobStore::new();
        store.set("a", Bytes::from_static(b"1")).await.unwrap();
        store.set_unavailable(true);

        assert!(matches!(store.get("a").await, Err(StoreError::Unavailable(_))));
        assert!(store.set("b", Bytes::new()).await.is_err());
        assert_eq!(store.keys(), vec!["a".to_string()]);

        store.set_unavailable(false);
        assert!(store.get("a").await.unwrap().is_some());
    }
}
