use std::sync::Arc;

use bytes::Bytes;
use domain_embedding::EmbeddingExtractor;
use domain_vectordb::{CollectionHandle, SearchRequest};
use serde_json::json;
use tracing::{debug, instrument};

use crate::error::QueryError;
use crate::models::{ImageExtension, ImageMatch};

/// An image file submitted as a query.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content: Bytes,
}

/// Read path: embed the query, ask the engine for nearest neighbors, map
/// hits back to public image URLs.
///
/// Results reflect what has been flushed so far; an object inserted moments
/// ago may be missing from one query and present in the next.
pub struct QueryService {
    extractor: Arc<dyn EmbeddingExtractor>,
    collection: Arc<CollectionHandle>,
    top_k: usize,
    /// Public URL prefix of the destination bucket.
    locator_base: String,
}

impl QueryService {
    pub fn new(
        extractor: Arc<dyn EmbeddingExtractor>,
        collection: Arc<CollectionHandle>,
        top_k: usize,
        locator_base: &str,
    ) -> Self {
        Self {
            extractor,
            collection,
            top_k,
            locator_base: locator_base.trim_end_matches('/').to_string(),
        }
    }

    #[instrument(skip(self, query))]
    pub async fn search_by_text(&self, query: &str) -> Result<Vec<ImageMatch>, QueryError> {
        let embedding = self.extractor.embed_text(query).await?;
        self.search_embedding(embedding).await
    }

    /// Unsupported file types yield an empty result rather than an error;
    /// the extractor is never consulted for them.
    #[instrument(skip(self, upload), fields(file = %upload.file_name))]
    pub async fn search_by_image(&self, upload: &ImageUpload) -> Result<Vec<ImageMatch>, QueryError> {
        if !ImageExtension::is_supported(&upload.file_name) {
            debug!("Unsupported upload extension, returning no matches");
            return Ok(vec![]);
        }
        let embedding = self.extractor.embed_image(&upload.content).await?;
        self.search_embedding(embedding).await
    }

    async fn search_embedding(&self, embedding: Vec<f32>) -> Result<Vec<ImageMatch>, QueryError> {
        let schema = self.collection.schema();
        let request = SearchRequest {
            top_k: self.top_k,
            vectors: vec![embedding],
            vector_field: schema.vector_field.clone(),
            out_fields: vec![schema.identifier_field.clone()],
            params: json!({ "nprobe": 10 }),
        };

        let mut results = self.collection.search(request).await?;
        let hits = if results.is_empty() {
            vec![]
        } else {
            results.swap_remove(0)
        };

        Ok(hits
            .iter()
            .filter_map(|hit| hit.str_field(&schema.identifier_field))
            .map(|name| ImageMatch {
                name: name.to_string(),
                locator: format!("{}/{}", self.locator_base, name),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_embedding::MockEmbeddingExtractor;
    use domain_vectordb::{
        CollectionManager, CollectionSchema, MockVectorStoreClient, SearchHit,
    };
    use op_bridge::{BridgeConfig, OpBridge};

    fn hit(path: &str, distance: f32) -> SearchHit {
        let mut fields = serde_json::Map::new();
        fields.insert("path".to_string(), json!(path));
        SearchHit { distance, fields }
    }

    async fn loaded_collection(mut mock: MockVectorStoreClient) -> Arc<CollectionHandle> {
        mock.expect_has_collection().returning(|_, _| Ok(true));
        mock.expect_describe_collection()
            .returning(|_, _| Ok(Some(CollectionSchema::new("path", "embedding", 512))));
        mock.expect_load_collection().returning(|_, _| Ok(()));
        let manager = CollectionManager::new(
            OpBridge::new(BridgeConfig::default()),
            Arc::new(mock),
            "aisearch",
        );
        let handle = manager
            .collection("products", CollectionSchema::new("path", "embedding", 512))
            .await
            .unwrap();
        handle.load().await.unwrap();
        Arc::new(handle)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn text_search_maps_hits_to_public_locators() {
        let mut extractor = MockEmbeddingExtractor::new();
        extractor
            .expect_embed_text()
            .times(1)
            .returning(|_| Ok(vec![0.1; 512]));

        let mut engine = MockVectorStoreClient::new();
        engine
            .expect_search()
            .withf(|_, _, request| {
                request.top_k == 5
                    && request.vector_field == "embedding"
                    && request.out_fields == vec!["path".to_string()]
            })
            .returning(|_, _, _| Ok(vec![vec![hit("a.jpg", 0.97), hit("b.png", 0.84)]]));

        let service = QueryService::new(
            Arc::new(extractor),
            loaded_collection(engine).await,
            5,
            "http://store.local/products/",
        );

        let matches = service.search_by_text("red bicycle").await.unwrap();
        assert_eq!(
            matches,
            vec![
                ImageMatch {
                    name: "a.jpg".to_string(),
                    locator: "http://store.local/products/a.jpg".to_string(),
                },
                ImageMatch {
                    name: "b.png".to_string(),
                    locator: "http://store.local/products/b.png".to_string(),
                },
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn image_search_embeds_the_upload() {
        let mut extractor = MockEmbeddingExtractor::new();
        extractor
            .expect_embed_image()
            .times(1)
            .returning(|_| Ok(vec![0.2; 512]));

        let mut engine = MockVectorStoreClient::new();
        engine
            .expect_search()
            .returning(|_, _, _| Ok(vec![vec![hit("c.jpeg", 0.9)]]));

        let service = QueryService::new(
            Arc::new(extractor),
            loaded_collection(engine).await,
            10,
            "http://store.local/products",
        );

        let upload = ImageUpload {
            file_name: "query.JPG".to_string(),
            content: Bytes::from_static(b"jpeg"),
        };
        let matches = service.search_by_image(&upload).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].name, "c.jpeg");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unsupported_upload_type_soft_fails_without_extraction() {
        let mut extractor = MockEmbeddingExtractor::new();
        extractor.expect_embed_image().never();

        let mut engine = MockVectorStoreClient::new();
        engine.expect_search().never();

        let service = QueryService::new(
            Arc::new(extractor),
            loaded_collection(engine).await,
            10,
            "http://store.local/products",
        );

        let upload = ImageUpload {
            file_name: "doc.pdf".to_string(),
            content: Bytes::from_static(b"%PDF"),
        };
        assert!(service.search_by_image(&upload).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn empty_result_set_yields_no_matches() {
        let mut extractor = MockEmbeddingExtractor::new();
        extractor
            .expect_embed_text()
            .returning(|_| Ok(vec![0.3; 512]));

        let mut engine = MockVectorStoreClient::new();
        engine.expect_search().returning(|_, _, _| Ok(vec![vec![]]));

        let service = QueryService::new(
            Arc::new(extractor),
            loaded_collection(engine).await,
            10,
            "http://store.local/products",
        );

        assert!(service.search_by_text("nothing").await.unwrap().is_empty());
    }
}
