use async_trait::async_trait;
use bytes::Bytes;

use crate::error::ExtractionError;

/// External embedding model: image or text in, fixed-length vector out.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait EmbeddingExtractor: Send + Sync {
    async fn embed_image(&self, image: &[u8]) -> Result<Vec<f32>, ExtractionError>;

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, ExtractionError>;

    /// Batched image extraction; the result preserves input order so names
    /// and embeddings stay correlated by index.
    async fn embed_image_batch(&self, images: &[Bytes]) -> Result<Vec<Vec<f32>>, ExtractionError>;

    /// Fixed output dimension D; must match the collection's vector column.
    fn dimension(&self) -> usize;
}
