use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use crate::error::{StorageError, StorageResult};
use crate::store::ObjectStore;

/// In-process store for tests and local development.
///
/// Listing order is lexicographic by name, which is deterministic but — like
/// the real service — not something callers may rely on.
#[derive(Default)]
pub struct MemoryObjectStore {
    buckets: RwLock<HashMap<String, BTreeMap<String, Bytes>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn object_count(&self, bucket: &str) -> usize {
        self.buckets
            .read()
            .await
            .get(bucket)
            .map(|b| b.len())
            .unwrap_or(0)
    }

    pub async fn contains(&self, bucket: &str, name: &str) -> bool {
        self.buckets
            .read()
            .await
            .get(bucket)
            .is_some_and(|b| b.contains_key(name))
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn ensure_bucket(&self, bucket: &str, _public_read: bool) -> StorageResult<()> {
        self.buckets
            .write()
            .await
            .entry(bucket.to_string())
            .or_default();
        Ok(())
    }

    async fn put(&self, bucket: &str, name: &str, content: Bytes) -> StorageResult<()> {
        let mut buckets = self.buckets.write().await;
        let bucket = buckets
            .get_mut(bucket)
            .ok_or_else(|| StorageError::NotFound(bucket.to_string()))?;
        bucket.insert(name.to_string(), content);
        Ok(())
    }

    async fn get(&self, bucket: &str, name: &str) -> StorageResult<Bytes> {
        self.buckets
            .read()
            .await
            .get(bucket)
            .and_then(|b| b.get(name))
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("{}/{}", bucket, name)))
    }

    async fn delete(&self, bucket: &str, name: &str) -> StorageResult<()> {
        let mut buckets = self.buckets.write().await;
        let bucket = buckets
            .get_mut(bucket)
            .ok_or_else(|| StorageError::NotFound(bucket.to_string()))?;
        bucket.remove(name);
        Ok(())
    }

    async fn list(&self, bucket: &str, max: usize) -> StorageResult<Vec<String>> {
        Ok(self
            .buckets
            .read()
            .await
            .get(bucket)
            .map(|b| b.keys().take(max).cloned().collect())
            .unwrap_or_default())
    }
}
