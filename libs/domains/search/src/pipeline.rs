use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use domain_embedding::EmbeddingExtractor;
use domain_storage::{BucketStore, PendingObject};
use domain_vectordb::{CollectionHandle, ColumnBatch, ColumnValues};
use futures::future::join_all;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info, instrument, warn};

use crate::error::{PipelineError, RelocationError};
use crate::models::{TickOutcome, TickSummary};

/// Scheduled batch importer: drains the landing bucket into the vector
/// collection, then relocates the processed objects to the destination
/// bucket.
///
/// Ticks never overlap — a tick that finds the previous one still running
/// skips immediately. The insert happens before relocation, so a crash or a
/// failed relocation leaves objects in the landing bucket and the next tick
/// re-inserts them; duplicates are accepted, losing an image is not.
pub struct IngestionPipeline {
    landing: BucketStore,
    destination: BucketStore,
    extractor: Arc<dyn EmbeddingExtractor>,
    collection: Arc<CollectionHandle>,
    busy: Mutex<()>,
}

impl IngestionPipeline {
    pub fn new(
        landing: BucketStore,
        destination: BucketStore,
        extractor: Arc<dyn EmbeddingExtractor>,
        collection: Arc<CollectionHandle>,
    ) -> Self {
        Self {
            landing,
            destination,
            extractor,
            collection,
            busy: Mutex::new(()),
        }
    }

    /// Run one ingestion pass, or skip if one is already in flight.
    #[instrument(skip(self))]
    pub async fn tick(&self) -> Result<TickOutcome, PipelineError> {
        let Ok(_guard) = self.busy.try_lock() else {
            debug!("Previous tick still running, skipping");
            return Ok(TickOutcome::Skipped);
        };
        self.drain().await.map(TickOutcome::Completed)
    }

    /// Wait for any in-flight tick to finish. Callers bound the wait
    /// themselves; new ticks may still start afterwards unless the schedule
    /// is already stopped.
    pub async fn quiesce(&self) {
        drop(self.busy.lock().await);
    }

    async fn drain(&self) -> Result<TickSummary, PipelineError> {
        let pending = self.landing.pending_objects().await?;
        if pending.is_empty() {
            return Ok(TickSummary::default());
        }
        info!(count = pending.len(), "Importing pending uploads");

        let contents: Vec<Bytes> = pending.iter().map(|o| o.content.clone()).collect();
        let embeddings = self.extractor.embed_image_batch(&contents).await?;
        drop(contents);

        let names: Vec<String> = pending.iter().map(|o| o.name.clone()).collect();
        let inserted = self.insert_batch(names, embeddings).await?;
        self.collection.flush().await?;

        // Relocations run concurrently and fail independently; an object
        // that stays behind is simply re-ingested next tick.
        let processed = pending.len();
        let outcomes = join_all(pending.into_iter().map(|o| self.relocate(o))).await;
        let relocated = outcomes.iter().filter(|r| r.is_ok()).count();

        let summary = TickSummary {
            processed,
            inserted,
            relocated,
            relocation_failures: processed - relocated,
        };
        info!(%summary, "Ingestion tick complete");
        Ok(summary)
    }

    /// Insert one already-embedded object outside the scheduled loop. The
    /// image is written straight to the destination bucket; it never passes
    /// through the landing bucket.
    #[instrument(skip(self, content))]
    pub async fn ingest_object(&self, name: &str, content: Bytes) -> Result<(), PipelineError> {
        let embedding = self.extractor.embed_image(&content).await?;
        self.insert_batch(vec![name.to_string()], vec![embedding])
            .await?;
        self.collection.flush().await?;
        self.destination
            .put_object(name, content)
            .await
            .map_err(|source| RelocationError {
                name: name.to_string(),
                source,
            })?;
        Ok(())
    }

    async fn insert_batch(
        &self,
        names: Vec<String>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<u64, PipelineError> {
        let schema = self.collection.schema();
        let batch = ColumnBatch::new()
            .with_column(&schema.identifier_field, ColumnValues::Str(names))
            .with_column(&schema.vector_field, ColumnValues::FloatVector(embeddings));
        Ok(self.collection.insert(batch).await?)
    }

    async fn relocate(&self, object: PendingObject) -> Result<(), RelocationError> {
        let result = async {
            self.destination
                .put_object(&object.name, object.content.clone())
                .await?;
            self.landing.delete_object(&object.name).await
        }
        .await;

        result.map_err(|source| {
            warn!(name = %object.name, error = %source, "Relocation failed, object stays in landing");
            RelocationError {
                name: object.name,
                source,
            }
        })
    }

    /// Tick on a fixed interval until the returned scheduler is shut down.
    pub async fn run_scheduled(
        self: &Arc<Self>,
        every: Duration,
    ) -> Result<JobScheduler, PipelineError> {
        let scheduler = JobScheduler::new().await.map_err(to_scheduler_error)?;

        let pipeline = Arc::clone(self);
        let job = Job::new_repeated_async(every, move |_uuid, _lock| {
            let pipeline = Arc::clone(&pipeline);
            Box::pin(async move {
                match pipeline.tick().await {
                    Ok(_) => {}
                    Err(e) => error!(error = %e, "Ingestion tick failed"),
                }
            })
        })
        .map_err(to_scheduler_error)?;

        scheduler.add(job).await.map_err(to_scheduler_error)?;
        scheduler.start().await.map_err(to_scheduler_error)?;
        info!(interval = ?every, "Ingestion schedule started");
        Ok(scheduler)
    }
}

fn to_scheduler_error(err: tokio_cron_scheduler::JobSchedulerError) -> PipelineError {
    PipelineError::Scheduler(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use domain_embedding::MockEmbeddingExtractor;
    use domain_storage::{
        BucketConfig, MemoryObjectStore, MockObjectStore, ObjectStore, StorageError,
    };
    use domain_vectordb::{
        CollectionManager, CollectionSchema, InsertOutcome, MockVectorStoreClient, RpcError,
    };
    use op_bridge::{BridgeConfig, OpBridge};

    const DIM: usize = 512;

    fn bucket(store: Arc<dyn ObjectStore>, name: &str) -> BucketStore {
        BucketStore::new(
            store,
            BucketConfig {
                bucket: name.to_string(),
                batch_size: 16,
                public_read: name == "products",
            },
        )
    }

    async fn loaded_collection(mut mock: MockVectorStoreClient) -> Arc<CollectionHandle> {
        mock.expect_has_collection().returning(|_, _| Ok(true));
        mock.expect_describe_collection()
            .returning(|_, _| Ok(Some(CollectionSchema::new("path", "embedding", DIM as u32))));
        mock.expect_load_collection().returning(|_, _| Ok(()));
        let manager = CollectionManager::new(
            OpBridge::new(BridgeConfig::default()),
            Arc::new(mock),
            "aisearch",
        );
        let handle = manager
            .collection("products", CollectionSchema::new("path", "embedding", DIM as u32))
            .await
            .unwrap();
        handle.load().await.unwrap();
        Arc::new(handle)
    }

    fn ordered_embeddings() -> impl Fn(&[Bytes]) -> Result<Vec<Vec<f32>>, domain_embedding::ExtractionError>
    {
        |images: &[Bytes]| {
            Ok(images
                .iter()
                .enumerate()
                .map(|(i, _)| vec![i as f32; DIM])
                .collect())
        }
    }

    async fn seeded_landing(store: &Arc<MemoryObjectStore>, names: &[&str]) {
        store.ensure_bucket("import", false).await.unwrap();
        for name in names {
            store
                .put("import", name, Bytes::from(format!("img-{name}")))
                .await
                .unwrap();
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn empty_landing_bucket_touches_nothing_downstream() {
        let store = Arc::new(MemoryObjectStore::new());
        seeded_landing(&store, &[]).await;
        store.ensure_bucket("products", true).await.unwrap();

        let mut extractor = MockEmbeddingExtractor::new();
        extractor.expect_embed_image_batch().never();

        let mut engine = MockVectorStoreClient::new();
        engine.expect_insert().never();
        engine.expect_flush().never();

        let pipeline = IngestionPipeline::new(
            bucket(Arc::clone(&store) as Arc<dyn ObjectStore>, "import"),
            bucket(Arc::clone(&store) as Arc<dyn ObjectStore>, "products"),
            Arc::new(extractor),
            loaded_collection(engine).await,
        );

        let outcome = pipeline.tick().await.unwrap();
        assert_eq!(outcome, TickOutcome::Completed(TickSummary::default()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn tick_inserts_then_relocates_every_pending_object() {
        let store = Arc::new(MemoryObjectStore::new());
        seeded_landing(&store, &["a.jpg", "b.jpg", "c.jpg"]).await;
        store.ensure_bucket("products", true).await.unwrap();

        let mut extractor = MockEmbeddingExtractor::new();
        extractor
            .expect_embed_image_batch()
            .times(1)
            .returning(ordered_embeddings());

        let mut engine = MockVectorStoreClient::new();
        engine
            .expect_insert()
            .times(1)
            .withf(|_, _, batch| {
                let columns = batch.columns();
                columns[0].1
                    == ColumnValues::Str(vec![
                        "a.jpg".to_string(),
                        "b.jpg".to_string(),
                        "c.jpg".to_string(),
                    ])
                    && columns[1].1.len() == 3
            })
            .returning(|_, _, _| Ok(InsertOutcome { inserted: 3 }));
        engine.expect_flush().times(1).returning(|_, _| Ok(()));

        let pipeline = IngestionPipeline::new(
            bucket(Arc::clone(&store) as Arc<dyn ObjectStore>, "import"),
            bucket(Arc::clone(&store) as Arc<dyn ObjectStore>, "products"),
            Arc::new(extractor),
            loaded_collection(engine).await,
        );

        let outcome = pipeline.tick().await.unwrap();
        assert_eq!(
            outcome,
            TickOutcome::Completed(TickSummary {
                processed: 3,
                inserted: 3,
                relocated: 3,
                relocation_failures: 0,
            })
        );
        assert_eq!(store.object_count("import").await, 0);
        assert_eq!(store.object_count("products").await, 3);
        assert!(store.contains("products", "b.jpg").await);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn extraction_failure_aborts_before_insert_and_relocation() {
        let store = Arc::new(MemoryObjectStore::new());
        seeded_landing(&store, &["a.jpg"]).await;
        store.ensure_bucket("products", true).await.unwrap();

        let mut extractor = MockEmbeddingExtractor::new();
        extractor.expect_embed_image_batch().returning(|_| {
            Err(domain_embedding::ExtractionError::Model {
                status: 500,
                body: "model overloaded".to_string(),
            })
        });

        let mut engine = MockVectorStoreClient::new();
        engine.expect_insert().never();
        engine.expect_flush().never();

        let pipeline = IngestionPipeline::new(
            bucket(Arc::clone(&store) as Arc<dyn ObjectStore>, "import"),
            bucket(Arc::clone(&store) as Arc<dyn ObjectStore>, "products"),
            Arc::new(extractor),
            loaded_collection(engine).await,
        );

        let err = pipeline.tick().await.unwrap_err();
        assert!(matches!(err, PipelineError::Extraction(_)));
        // Nothing was relocated; the object is retried next tick.
        assert_eq!(store.object_count("import").await, 1);
        assert_eq!(store.object_count("products").await, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn insert_failure_leaves_objects_in_landing() {
        let store = Arc::new(MemoryObjectStore::new());
        seeded_landing(&store, &["a.jpg", "b.jpg"]).await;
        store.ensure_bucket("products", true).await.unwrap();

        let mut extractor = MockEmbeddingExtractor::new();
        extractor
            .expect_embed_image_batch()
            .returning(ordered_embeddings());

        let mut engine = MockVectorStoreClient::new();
        engine.expect_insert().returning(|_, _, _| {
            Err(RpcError::Status {
                code: 1,
                message: "rate limited".to_string(),
            })
        });
        engine.expect_flush().never();

        let pipeline = IngestionPipeline::new(
            bucket(Arc::clone(&store) as Arc<dyn ObjectStore>, "import"),
            bucket(Arc::clone(&store) as Arc<dyn ObjectStore>, "products"),
            Arc::new(extractor),
            loaded_collection(engine).await,
        );

        let err = pipeline.tick().await.unwrap_err();
        assert!(matches!(err, PipelineError::Insert(_)));
        assert_eq!(store.object_count("import").await, 2);
        assert_eq!(store.object_count("products").await, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn relocation_failures_are_isolated_per_object() {
        let landing_store = Arc::new(MemoryObjectStore::new());
        seeded_landing(&landing_store, &["a.jpg", "b.jpg", "c.jpg"]).await;

        // Destination rejects b.jpg only; a and c must still move.
        let mut destination = MockObjectStore::new();
        destination.expect_put().returning(|_, name, _| {
            if name == "b.jpg" {
                Err(StorageError::Status {
                    status: 503,
                    path: "products/b.jpg".to_string(),
                })
            } else {
                Ok(())
            }
        });

        let mut extractor = MockEmbeddingExtractor::new();
        extractor
            .expect_embed_image_batch()
            .returning(ordered_embeddings());

        let mut engine = MockVectorStoreClient::new();
        engine
            .expect_insert()
            .returning(|_, _, _| Ok(InsertOutcome { inserted: 3 }));
        engine.expect_flush().returning(|_, _| Ok(()));

        let pipeline = IngestionPipeline::new(
            bucket(Arc::clone(&landing_store) as Arc<dyn ObjectStore>, "import"),
            bucket(Arc::new(destination), "products"),
            Arc::new(extractor),
            loaded_collection(engine).await,
        );

        let outcome = pipeline.tick().await.unwrap();
        assert_eq!(
            outcome,
            TickOutcome::Completed(TickSummary {
                processed: 3,
                inserted: 3,
                relocated: 2,
                relocation_failures: 1,
            })
        );
        // Only the failed object stays behind.
        assert!(landing_store.contains("import", "b.jpg").await);
        assert_eq!(landing_store.object_count("import").await, 1);
    }

    /// Landing store whose listing stalls, so a tick can be caught mid-run.
    struct SlowStore {
        inner: Arc<MemoryObjectStore>,
        delay: Duration,
    }

    #[async_trait]
    impl ObjectStore for SlowStore {
        async fn ensure_bucket(&self, bucket: &str, public_read: bool) -> Result<(), StorageError> {
            self.inner.ensure_bucket(bucket, public_read).await
        }

        async fn put(&self, bucket: &str, name: &str, content: Bytes) -> Result<(), StorageError> {
            self.inner.put(bucket, name, content).await
        }

        async fn get(&self, bucket: &str, name: &str) -> Result<Bytes, StorageError> {
            self.inner.get(bucket, name).await
        }

        async fn delete(&self, bucket: &str, name: &str) -> Result<(), StorageError> {
            self.inner.delete(bucket, name).await
        }

        async fn list(&self, bucket: &str, max: usize) -> Result<Vec<String>, StorageError> {
            tokio::time::sleep(self.delay).await;
            self.inner.list(bucket, max).await
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_tick_is_skipped_not_queued() {
        let inner = Arc::new(MemoryObjectStore::new());
        seeded_landing(&inner, &["a.jpg"]).await;
        inner.ensure_bucket("products", true).await.unwrap();
        let slow = Arc::new(SlowStore {
            inner: Arc::clone(&inner),
            delay: Duration::from_millis(200),
        });

        let mut extractor = MockEmbeddingExtractor::new();
        extractor
            .expect_embed_image_batch()
            .times(1)
            .returning(ordered_embeddings());

        let mut engine = MockVectorStoreClient::new();
        engine
            .expect_insert()
            .times(1)
            .returning(|_, _, _| Ok(InsertOutcome { inserted: 1 }));
        engine.expect_flush().times(1).returning(|_, _| Ok(()));

        let pipeline = Arc::new(IngestionPipeline::new(
            bucket(Arc::clone(&slow) as Arc<dyn ObjectStore>, "import"),
            bucket(Arc::clone(&inner) as Arc<dyn ObjectStore>, "products"),
            Arc::new(extractor),
            loaded_collection(engine).await,
        ));

        let first = tokio::spawn({
            let pipeline = Arc::clone(&pipeline);
            async move { pipeline.tick().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let second = pipeline.tick().await.unwrap();
        assert_eq!(second, TickOutcome::Skipped);

        let first = first.await.unwrap().unwrap();
        assert!(matches!(first, TickOutcome::Completed(s) if s.processed == 1));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn ingest_object_embeds_inserts_and_stores_the_image() {
        let store = Arc::new(MemoryObjectStore::new());
        store.ensure_bucket("import", false).await.unwrap();
        store.ensure_bucket("products", true).await.unwrap();

        let mut extractor = MockEmbeddingExtractor::new();
        extractor
            .expect_embed_image()
            .times(1)
            .returning(|_| Ok(vec![0.5; DIM]));

        let mut engine = MockVectorStoreClient::new();
        engine
            .expect_insert()
            .times(1)
            .withf(|_, _, batch| {
                batch.columns()[0].1 == ColumnValues::Str(vec!["solo.png".to_string()])
            })
            .returning(|_, _, _| Ok(InsertOutcome { inserted: 1 }));
        engine.expect_flush().times(1).returning(|_, _| Ok(()));

        let pipeline = IngestionPipeline::new(
            bucket(Arc::clone(&store) as Arc<dyn ObjectStore>, "import"),
            bucket(Arc::clone(&store) as Arc<dyn ObjectStore>, "products"),
            Arc::new(extractor),
            loaded_collection(engine).await,
        );

        pipeline
            .ingest_object("solo.png", Bytes::from_static(b"png"))
            .await
            .unwrap();
        assert!(store.contains("products", "solo.png").await);
        assert_eq!(store.object_count("import").await, 0);
    }
}
