use async_trait::async_trait;

use crate::error::RpcResult;
use crate::schema::{
    CollectionSchema, ColumnBatch, IndexDescriptor, InsertOutcome, SearchHit, SearchRequest,
};

/// The engine client's two native call shapes, in one trait.
///
/// Control-plane methods block their thread (the real client offers no async
/// form for them) and must therefore run on the bridge's bounded pool.
/// Data-plane methods are native futures and run unbounded. The client is
/// assumed thread-safe per call; one instance is shared by all collections
/// and callers.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait VectorStoreClient: Send + Sync {
    // Control plane (blocking).

    fn list_databases(&self) -> RpcResult<Vec<String>>;

    fn create_database(&self, name: &str) -> RpcResult<()>;

    fn has_collection(&self, database: &str, collection: &str) -> RpcResult<bool>;

    /// Remote schema of an existing collection, `None` when absent.
    fn describe_collection(
        &self,
        database: &str,
        collection: &str,
    ) -> RpcResult<Option<CollectionSchema>>;

    fn create_collection(
        &self,
        database: &str,
        collection: &str,
        schema: &CollectionSchema,
    ) -> RpcResult<()>;

    fn index_exists(&self, database: &str, collection: &str, index_name: &str) -> RpcResult<bool>;

    fn create_index(
        &self,
        database: &str,
        collection: &str,
        index: &IndexDescriptor,
    ) -> RpcResult<()>;

    fn load_collection(&self, database: &str, collection: &str) -> RpcResult<()>;

    fn release_collection(&self, database: &str, collection: &str) -> RpcResult<()>;

    /// Force buffered inserts to become visible to subsequent reads.
    fn flush(&self, database: &str, collection: &str) -> RpcResult<()>;

    // Data plane (native async).

    async fn insert(
        &self,
        database: &str,
        collection: &str,
        batch: ColumnBatch,
    ) -> RpcResult<InsertOutcome>;

    /// Up to `top_k` ranked neighbors per submitted vector, eventually
    /// consistent.
    async fn search(
        &self,
        database: &str,
        collection: &str,
        request: SearchRequest,
    ) -> RpcResult<Vec<Vec<SearchHit>>>;
}
