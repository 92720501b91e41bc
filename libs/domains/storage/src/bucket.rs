use std::sync::Arc;

use bytes::Bytes;
use futures::future::try_join_all;
use tracing::instrument;

use crate::error::StorageResult;
use crate::store::{ObjectStore, PendingObject};

/// Settings for one logical bucket role.
#[derive(Debug, Clone)]
pub struct BucketConfig {
    pub bucket: String,
    pub batch_size: usize,
    pub public_read: bool,
}

/// One logical bucket role (landing or destination) over the shared store.
///
/// Composes the [`ObjectStore`] capability with a bucket name, listing batch
/// size and public-read policy; one instance is built per role.
#[derive(Clone)]
pub struct BucketStore {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    batch_size: usize,
    public_read: bool,
}

impl BucketStore {
    pub fn new(store: Arc<dyn ObjectStore>, config: BucketConfig) -> Self {
        Self {
            store,
            bucket: config.bucket,
            batch_size: config.batch_size.max(1),
            public_read: config.public_read,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Auto-provision the bucket, applying the role's read policy.
    pub async fn ensure(&self) -> StorageResult<()> {
        self.store.ensure_bucket(&self.bucket, self.public_read).await
    }

    /// Snapshot of up to `batch_size` pending objects with their content.
    ///
    /// Contents are fetched concurrently but returned in listing order, so
    /// name and content stay correlated by index downstream.
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    pub async fn pending_objects(&self) -> StorageResult<Vec<PendingObject>> {
        let names = self.store.list(&self.bucket, self.batch_size).await?;
        let fetches = names.into_iter().map(|name| {
            let store = Arc::clone(&self.store);
            let bucket = self.bucket.clone();
            async move {
                let content = store.get(&bucket, &name).await?;
                Ok(PendingObject { name, content })
            }
        });
        try_join_all(fetches).await
    }

    pub async fn put_object(&self, name: &str, content: Bytes) -> StorageResult<()> {
        self.store.put(&self.bucket, name, content).await
    }

    pub async fn delete_object(&self, name: &str) -> StorageResult<()> {
        self.store.delete(&self.bucket, name).await
    }

    pub async fn object_count(&self) -> StorageResult<usize> {
        Ok(self.store.list(&self.bucket, usize::MAX).await?.len())
    }
}
