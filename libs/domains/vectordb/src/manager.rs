use std::sync::{Arc, Mutex};

use op_bridge::{BridgeError, OpBridge};
use tracing::{debug, info, instrument, warn};

use crate::client::VectorStoreClient;
use crate::error::{InsertError, ProvisioningError, RpcError, SearchError};
use crate::schema::{CollectionSchema, ColumnBatch, IndexDescriptor, SearchHit, SearchRequest};

/// Provisioning state, strictly left-to-right with idempotent re-entry at
/// every step. `Uninitialized` and `DatabaseReady` are the manager's phase;
/// a [`CollectionHandle`] starts at `CollectionReady`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionState {
    Uninitialized,
    DatabaseReady,
    CollectionReady,
    IndexReady,
    Loaded,
    Released,
    Closed,
}

fn bridge_to_rpc(err: BridgeError<RpcError>) -> RpcError {
    err.into_op_error(RpcError::Transport)
}

fn is_already_exists(message: &str) -> bool {
    message.to_ascii_lowercase().contains("already exist")
}

/// Idempotent provisioning entry point for one remote database.
///
/// One engine connection is shared by every collection and caller; the
/// manager only hands out [`CollectionHandle`]s, it holds no per-collection
/// state itself.
#[derive(Clone)]
pub struct CollectionManager {
    bridge: OpBridge,
    client: Arc<dyn VectorStoreClient>,
    database: String,
}

impl CollectionManager {
    pub fn new(bridge: OpBridge, client: Arc<dyn VectorStoreClient>, database: &str) -> Self {
        Self {
            bridge,
            client,
            database: database.to_string(),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Check-then-create; an "already exists" answer from the engine is
    /// success. The database is never deleted by this system.
    #[instrument(skip(self), fields(database = %self.database))]
    pub async fn ensure_database(&self) -> Result<(), ProvisioningError> {
        let client = Arc::clone(&self.client);
        let names = self
            .bridge
            .submit_blocking(move || client.list_databases())
            .join()
            .await
            .map_err(bridge_to_rpc)?;

        if names.iter().any(|n| n.eq_ignore_ascii_case(&self.database)) {
            debug!("Database already present");
            return Ok(());
        }

        let client = Arc::clone(&self.client);
        let name = self.database.clone();
        match self
            .bridge
            .submit_blocking(move || client.create_database(&name))
            .join()
            .await
            .map_err(bridge_to_rpc)
        {
            Ok(()) => {
                info!("Database created");
                Ok(())
            }
            Err(RpcError::Status { message, .. }) if is_already_exists(&message) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Ensure the collection exists with exactly `schema` and return a live
    /// handle to it.
    ///
    /// Schema validation runs before any remote call; drift against an
    /// already-existing collection is a [`ProvisioningError::SchemaMismatch`],
    /// never silently ignored.
    #[instrument(skip(self, schema), fields(database = %self.database, collection = name))]
    pub async fn collection(
        &self,
        name: &str,
        schema: CollectionSchema,
    ) -> Result<CollectionHandle, ProvisioningError> {
        schema.validate().map_err(ProvisioningError::InvalidSchema)?;

        let client = Arc::clone(&self.client);
        let (db, coll) = (self.database.clone(), name.to_string());
        let exists = self
            .bridge
            .submit_blocking(move || client.has_collection(&db, &coll))
            .join()
            .await
            .map_err(bridge_to_rpc)?;

        if exists {
            self.check_remote_schema(name, &schema).await?;
        } else {
            let client = Arc::clone(&self.client);
            let (db, coll, to_create) = (self.database.clone(), name.to_string(), schema.clone());
            match self
                .bridge
                .submit_blocking(move || client.create_collection(&db, &coll, &to_create))
                .join()
                .await
                .map_err(bridge_to_rpc)
            {
                Ok(()) => info!("Collection created"),
                // Lost a create race; verify the winner used our schema.
                Err(RpcError::Status { message, .. }) if is_already_exists(&message) => {
                    self.check_remote_schema(name, &schema).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(CollectionHandle {
            bridge: self.bridge.clone(),
            client: Arc::clone(&self.client),
            database: self.database.clone(),
            collection: name.to_string(),
            schema,
            state: Mutex::new(CollectionState::CollectionReady),
        })
    }

    async fn check_remote_schema(
        &self,
        name: &str,
        schema: &CollectionSchema,
    ) -> Result<(), ProvisioningError> {
        let client = Arc::clone(&self.client);
        let (db, coll) = (self.database.clone(), name.to_string());
        let remote = self
            .bridge
            .submit_blocking(move || client.describe_collection(&db, &coll))
            .join()
            .await
            .map_err(bridge_to_rpc)?;

        if let Some(remote) = remote {
            if let Some(details) = schema.drift_against(&remote) {
                return Err(ProvisioningError::SchemaMismatch {
                    collection: name.to_string(),
                    details,
                });
            }
        }
        Ok(())
    }
}

/// Live reference to a provisioned collection; acquired via
/// [`CollectionManager::collection`], never constructed directly.
pub struct CollectionHandle {
    bridge: OpBridge,
    client: Arc<dyn VectorStoreClient>,
    database: String,
    collection: String,
    schema: CollectionSchema,
    state: Mutex<CollectionState>,
}

impl std::fmt::Debug for CollectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionHandle")
            .field("database", &self.database)
            .field("collection", &self.collection)
            .field("schema", &self.schema)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl CollectionHandle {
    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn schema(&self) -> &CollectionSchema {
        &self.schema
    }

    pub fn state(&self) -> CollectionState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, next: CollectionState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = next;
    }

    /// Create the index unless one with that name already exists. Parameter
    /// drift against an existing index is not detected.
    #[instrument(skip(self, index), fields(collection = %self.collection, index = %index.name))]
    pub async fn ensure_index(&self, index: IndexDescriptor) -> Result<(), ProvisioningError> {
        if self.state() == CollectionState::Closed {
            return Err(ProvisioningError::Closed);
        }

        let client = Arc::clone(&self.client);
        let (db, coll, name) = (
            self.database.clone(),
            self.collection.clone(),
            index.name.clone(),
        );
        let exists = self
            .bridge
            .submit_blocking(move || client.index_exists(&db, &coll, &name))
            .join()
            .await
            .map_err(bridge_to_rpc)?;

        if exists {
            debug!("Index already present, skipping creation");
        } else {
            let client = Arc::clone(&self.client);
            let (db, coll) = (self.database.clone(), self.collection.clone());
            match self
                .bridge
                .submit_blocking(move || client.create_index(&db, &coll, &index))
                .join()
                .await
                .map_err(bridge_to_rpc)
            {
                Ok(()) => info!("Index created"),
                Err(RpcError::Status { message, .. }) if is_already_exists(&message) => {}
                Err(e) => return Err(e.into()),
            }
        }

        if self.state() == CollectionState::CollectionReady {
            self.set_state(CollectionState::IndexReady);
        }
        Ok(())
    }

    /// Load the collection into engine memory. Must complete before any
    /// [`search`](Self::search).
    #[instrument(skip(self), fields(collection = %self.collection))]
    pub async fn load(&self) -> Result<(), ProvisioningError> {
        if self.state() == CollectionState::Closed {
            return Err(ProvisioningError::Closed);
        }

        let client = Arc::clone(&self.client);
        let (db, coll) = (self.database.clone(), self.collection.clone());
        self.bridge
            .submit_blocking(move || client.load_collection(&db, &coll))
            .join()
            .await
            .map_err(bridge_to_rpc)?;
        self.set_state(CollectionState::Loaded);
        Ok(())
    }

    /// Safe to call from any state; a no-op when already released or closed.
    #[instrument(skip(self), fields(collection = %self.collection))]
    pub async fn release(&self) -> Result<(), ProvisioningError> {
        if matches!(
            self.state(),
            CollectionState::Released | CollectionState::Closed
        ) {
            return Ok(());
        }

        let client = Arc::clone(&self.client);
        let (db, coll) = (self.database.clone(), self.collection.clone());
        self.bridge
            .submit_blocking(move || client.release_collection(&db, &coll))
            .join()
            .await
            .map_err(bridge_to_rpc)?;
        self.set_state(CollectionState::Released);
        Ok(())
    }

    /// Release the collection and retire the handle. Idempotent; failures on
    /// the exit path are logged rather than propagated.
    pub async fn close(&self) {
        if self.state() == CollectionState::Closed {
            return;
        }
        if let Err(e) = self.release().await {
            warn!(collection = %self.collection, error = %e, "Release during close failed");
        }
        self.set_state(CollectionState::Closed);
    }

    /// Insert one column-oriented batch; returns the engine-reported row
    /// count. The reported count is not compared against the submitted row
    /// count — only an explicit failure status is an error.
    #[instrument(skip(self, batch), fields(collection = %self.collection))]
    pub async fn insert(&self, batch: ColumnBatch) -> Result<u64, InsertError> {
        if self.state() == CollectionState::Closed {
            return Err(InsertError::Closed);
        }
        let rows = batch
            .row_count()
            .map_err(InsertError::ColumnLengthMismatch)?;
        if rows == 0 {
            return Ok(0);
        }

        let client = Arc::clone(&self.client);
        let (db, coll) = (self.database.clone(), self.collection.clone());
        let outcome = self
            .bridge
            .submit_async(async move { client.insert(&db, &coll, batch).await })
            .join()
            .await
            .map_err(bridge_to_rpc)?;
        debug!(rows, reported = outcome.inserted, "Insert accepted");
        Ok(outcome.inserted)
    }

    /// Force buffered inserts to become visible to subsequent reads. Must be
    /// invoked after every insert batch that a near-term search depends on:
    /// the search read path is eventually consistent.
    #[instrument(skip(self), fields(collection = %self.collection))]
    pub async fn flush(&self) -> Result<(), InsertError> {
        if self.state() == CollectionState::Closed {
            return Err(InsertError::Closed);
        }

        let client = Arc::clone(&self.client);
        let (db, coll) = (self.database.clone(), self.collection.clone());
        self.bridge
            .submit_blocking(move || client.flush(&db, &coll))
            .join()
            .await
            .map_err(bridge_to_rpc)?;
        Ok(())
    }

    /// Ranked neighbors per query vector, in the engine's similarity order.
    #[instrument(skip(self, request), fields(collection = %self.collection, top_k = request.top_k))]
    pub async fn search(
        &self,
        request: SearchRequest,
    ) -> Result<Vec<Vec<SearchHit>>, SearchError> {
        if self.state() != CollectionState::Loaded {
            return Err(SearchError::NotLoaded);
        }

        let client = Arc::clone(&self.client);
        let (db, coll) = (self.database.clone(), self.collection.clone());
        self.bridge
            .submit_async(async move { client.search(&db, &coll, request).await })
            .join()
            .await
            .map_err(bridge_to_rpc)
            .map_err(SearchError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockVectorStoreClient;
    use crate::schema::{ColumnValues, DistanceMetric, IndexAlgorithm, InsertOutcome};
    use mockall::Sequence;
    use op_bridge::BridgeConfig;

    fn schema() -> CollectionSchema {
        CollectionSchema::new("path", "embedding", 512)
    }

    fn manager(mock: MockVectorStoreClient) -> CollectionManager {
        CollectionManager::new(
            OpBridge::new(BridgeConfig::default()),
            Arc::new(mock),
            "aisearch",
        )
    }

    async fn loaded_handle(mock: MockVectorStoreClient) -> CollectionHandle {
        let handle = ready_handle(mock).await;
        handle.load().await.unwrap();
        handle
    }

    async fn ready_handle(mut mock: MockVectorStoreClient) -> CollectionHandle {
        mock.expect_has_collection().returning(|_, _| Ok(true));
        mock.expect_describe_collection()
            .returning(|_, _| Ok(Some(CollectionSchema::new("path", "embedding", 512))));
        mock.expect_load_collection().returning(|_, _| Ok(()));
        manager(mock)
            .collection("products", schema())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn ensure_database_skips_create_when_present() {
        let mut mock = MockVectorStoreClient::new();
        mock.expect_list_databases()
            .returning(|| Ok(vec!["AISearch".to_string()]));
        mock.expect_create_database().never();

        manager(mock).ensure_database().await.unwrap();
    }

    #[tokio::test]
    async fn ensure_database_treats_already_exists_status_as_success() {
        let mut mock = MockVectorStoreClient::new();
        mock.expect_list_databases().returning(|| Ok(vec![]));
        mock.expect_create_database().returning(|_| {
            Err(RpcError::Status {
                code: 65535,
                message: "database already exists".to_string(),
            })
        });

        manager(mock).ensure_database().await.unwrap();
    }

    #[tokio::test]
    async fn ensure_database_surfaces_other_failures() {
        let mut mock = MockVectorStoreClient::new();
        mock.expect_list_databases().returning(|| Ok(vec![]));
        mock.expect_create_database().returning(|_| {
            Err(RpcError::Status {
                code: 1,
                message: "quota exceeded".to_string(),
            })
        });

        let err = manager(mock).ensure_database().await.unwrap_err();
        assert!(matches!(err, ProvisioningError::Rpc(_)));
    }

    #[tokio::test]
    async fn collection_is_created_once_across_repeated_ensures() {
        let mut mock = MockVectorStoreClient::new();
        let mut seq = Sequence::new();
        mock.expect_has_collection()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(false));
        mock.expect_create_collection()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        mock.expect_has_collection()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(true));
        mock.expect_describe_collection()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(Some(CollectionSchema::new("path", "embedding", 512))));

        let manager = manager(mock);
        manager.collection("products", schema()).await.unwrap();
        manager.collection("products", schema()).await.unwrap();
    }

    #[tokio::test]
    async fn schema_mismatch_against_existing_collection_is_an_error() {
        let mut mock = MockVectorStoreClient::new();
        mock.expect_has_collection().returning(|_, _| Ok(true));
        mock.expect_describe_collection()
            .returning(|_, _| Ok(Some(CollectionSchema::new("path", "embedding", 768))));

        let err = manager(mock)
            .collection("products", schema())
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisioningError::SchemaMismatch { .. }));
    }

    #[tokio::test]
    async fn invalid_schema_is_rejected_before_any_remote_call() {
        let mock = MockVectorStoreClient::new();
        let err = manager(mock)
            .collection("products", CollectionSchema::new("path", "embedding", 0))
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisioningError::InvalidSchema(_)));
    }

    #[tokio::test]
    async fn ensure_index_skips_when_name_already_exists() {
        let mut mock = MockVectorStoreClient::new();
        mock.expect_index_exists().returning(|_, _, _| Ok(true));
        mock.expect_create_index().never();

        let handle = ready_handle(mock).await;
        handle
            .ensure_index(IndexDescriptor {
                field: "embedding".to_string(),
                name: "idx_embedding".to_string(),
                algorithm: IndexAlgorithm::IvfFlat { nlist: 1024 },
                metric: DistanceMetric::Cosine,
            })
            .await
            .unwrap();
        assert_eq!(handle.state(), CollectionState::IndexReady);
    }

    #[tokio::test]
    async fn search_before_load_fails_without_touching_the_engine() {
        let mut mock = MockVectorStoreClient::new();
        mock.expect_search().never();
        let handle = ready_handle(mock).await;

        let err = handle
            .search(SearchRequest {
                top_k: 10,
                vectors: vec![vec![0.0; 512]],
                vector_field: "embedding".to_string(),
                out_fields: vec!["path".to_string()],
                params: serde_json::json!({}),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::NotLoaded));
    }

    #[tokio::test]
    async fn insert_rejects_unequal_column_lengths_locally() {
        let mut mock = MockVectorStoreClient::new();
        mock.expect_insert().never();
        let handle = loaded_handle(mock).await;

        let batch = ColumnBatch::new()
            .with_column("path", ColumnValues::Str(vec!["a.jpg".to_string()]))
            .with_column("embedding", ColumnValues::FloatVector(vec![]));
        let err = handle.insert(batch).await.unwrap_err();
        assert!(matches!(err, InsertError::ColumnLengthMismatch(_)));
    }

    #[tokio::test]
    async fn insert_returns_engine_count_even_when_it_disagrees() {
        let mut mock = MockVectorStoreClient::new();
        // Engine reports 2 for a 3-row batch; count mismatch is not an error.
        mock.expect_insert()
            .returning(|_, _, _| Ok(InsertOutcome { inserted: 2 }));
        let handle = loaded_handle(mock).await;

        let batch = ColumnBatch::new()
            .with_column(
                "path",
                ColumnValues::Str(vec!["a".into(), "b".into(), "c".into()]),
            )
            .with_column(
                "embedding",
                ColumnValues::FloatVector(vec![vec![0.0], vec![0.1], vec![0.2]]),
            );
        assert_eq!(handle.insert(batch).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn insert_failure_status_surfaces_as_insert_error() {
        let mut mock = MockVectorStoreClient::new();
        mock.expect_insert().returning(|_, _, _| {
            Err(RpcError::Status {
                code: 1,
                message: "rate limited".to_string(),
            })
        });
        let handle = loaded_handle(mock).await;

        let batch = ColumnBatch::new()
            .with_column("path", ColumnValues::Str(vec!["a".into()]))
            .with_column("embedding", ColumnValues::FloatVector(vec![vec![0.0]]));
        let err = handle.insert(batch).await.unwrap_err();
        assert!(matches!(err, InsertError::Rpc(RpcError::Status { .. })));
    }

    #[tokio::test]
    async fn release_is_idempotent_and_close_retires_the_handle() {
        let mut mock = MockVectorStoreClient::new();
        mock.expect_release_collection()
            .times(1)
            .returning(|_, _| Ok(()));
        let handle = loaded_handle(mock).await;

        handle.release().await.unwrap();
        handle.release().await.unwrap();
        assert_eq!(handle.state(), CollectionState::Released);

        handle.close().await;
        handle.close().await;
        assert_eq!(handle.state(), CollectionState::Closed);

        let batch = ColumnBatch::new()
            .with_column("path", ColumnValues::Str(vec!["a".into()]))
            .with_column("embedding", ColumnValues::FloatVector(vec![vec![0.0]]));
        assert!(matches!(
            handle.insert(batch).await.unwrap_err(),
            InsertError::Closed
        ));
    }
}
