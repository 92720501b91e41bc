//! Composition root: connects the external collaborators, provisions the
//! database/collection/index, and wires the pipeline and query service.

use std::sync::Arc;
use std::time::Duration;

use domain_embedding::ClipHttpExtractor;
use domain_search::{IngestionPipeline, QueryService};
use domain_storage::{BucketStore, HttpObjectStore, ObjectStore};
use domain_vectordb::{
    CollectionHandle, CollectionManager, CollectionSchema, DistanceMetric, HttpVectorStoreClient,
    IndexAlgorithm, IndexDescriptor,
};
use eyre::{Result, WrapErr};
use op_bridge::{BridgeConfig, OpBridge};
use tracing::{info, warn};

use crate::config::AppConfig;

const IDENTIFIER_FIELD: &str = "path";
const VECTOR_FIELD: &str = "embedding";
const INDEX_NAME: &str = "idx_embedding";
const IVF_NLIST: u32 = 1024;

const QUIESCE_TIMEOUT: Duration = Duration::from_secs(30);
const BRIDGE_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Engine {
    pub bridge: OpBridge,
    pub collection: Arc<CollectionHandle>,
    pub landing: BucketStore,
    pub pipeline: Arc<IngestionPipeline>,
    pub query: QueryService,
}

/// Build the engine. Provisioning is fatal here: a collection or bucket
/// that cannot be ensured means nothing downstream can work.
pub async fn bootstrap(config: &AppConfig) -> Result<Engine> {
    let bridge = OpBridge::new(BridgeConfig::default());

    let client = Arc::new(
        HttpVectorStoreClient::new(config.engine.clone())
            .wrap_err("Failed to build vector engine client")?,
    );
    let manager = CollectionManager::new(bridge.clone(), client, &config.database);
    manager
        .ensure_database()
        .await
        .wrap_err("Failed to ensure database")?;

    let schema = CollectionSchema::new(IDENTIFIER_FIELD, VECTOR_FIELD, config.model.dimension as u32);
    let handle = manager
        .collection(&config.collection, schema)
        .await
        .wrap_err_with(|| format!("Failed to ensure collection '{}'", config.collection))?;
    handle
        .ensure_index(IndexDescriptor {
            field: VECTOR_FIELD.to_string(),
            name: INDEX_NAME.to_string(),
            algorithm: IndexAlgorithm::IvfFlat { nlist: IVF_NLIST },
            metric: DistanceMetric::Cosine,
        })
        .await
        .wrap_err("Failed to ensure vector index")?;
    handle.load().await.wrap_err("Failed to load collection")?;
    let collection = Arc::new(handle);
    info!(collection = %config.collection, "Collection provisioned and loaded");

    let store: Arc<dyn ObjectStore> = Arc::new(
        HttpObjectStore::new(config.store.clone()).wrap_err("Failed to build object store client")?,
    );
    let landing = BucketStore::new(Arc::clone(&store), config.landing.clone());
    let destination = BucketStore::new(Arc::clone(&store), config.destination.clone());
    landing.ensure().await.wrap_err("Failed to ensure landing bucket")?;
    destination
        .ensure()
        .await
        .wrap_err("Failed to ensure destination bucket")?;

    let extractor = Arc::new(
        ClipHttpExtractor::new(config.model.clone()).wrap_err("Failed to build model client")?,
    );

    let pipeline = Arc::new(IngestionPipeline::new(
        landing.clone(),
        destination.clone(),
        extractor.clone(),
        Arc::clone(&collection),
    ));
    let locator_base = format!(
        "{}/b/{}/o",
        config.store.url.trim_end_matches('/'),
        destination.bucket()
    );
    let query = QueryService::new(extractor, Arc::clone(&collection), config.top_k, &locator_base);

    Ok(Engine {
        bridge,
        collection,
        landing,
        pipeline,
        query,
    })
}

impl Engine {
    /// Ordered shutdown: wait out any in-flight tick, retire the collection
    /// handle, then drain the bridge. Each step is bounded; a step that
    /// times out is logged and the sequence continues.
    pub async fn shutdown(&self) {
        if tokio::time::timeout(QUIESCE_TIMEOUT, self.pipeline.quiesce())
            .await
            .is_err()
        {
            warn!("In-flight tick did not finish in time, continuing shutdown");
        }
        self.collection.close().await;
        if !self.bridge.shutdown(BRIDGE_SHUTDOWN_TIMEOUT).await {
            warn!("Bridge shut down with operations still in flight");
        }
        info!("Shutdown complete");
    }
}
