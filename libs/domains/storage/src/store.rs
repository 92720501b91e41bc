use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StorageResult;

/// A named byte stream awaiting ingestion.
///
/// Owned transiently by whoever fetched it; the content buffer is dropped on
/// every exit path, success or failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingObject {
    pub name: String,
    pub content: Bytes,
}

/// Capability interface over the external object-storage service.
///
/// Buckets are auto-provisioned on first use via [`ensure_bucket`]
/// (optionally with a public-read policy); everything else is plain
/// put/get/delete/list of named byte streams.
///
/// [`ensure_bucket`]: ObjectStore::ensure_bucket
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create the bucket if absent; an existing bucket is success.
    async fn ensure_bucket(&self, bucket: &str, public_read: bool) -> StorageResult<()>;

    async fn put(&self, bucket: &str, name: &str, content: Bytes) -> StorageResult<()>;

    async fn get(&self, bucket: &str, name: &str) -> StorageResult<Bytes>;

    /// Deleting an absent object is success (the caller may be retrying).
    async fn delete(&self, bucket: &str, name: &str) -> StorageResult<()>;

    /// Up to `max` object names; a snapshot with no cross-object ordering
    /// guarantee.
    async fn list(&self, bucket: &str, max: usize) -> StorageResult<Vec<String>>;
}
