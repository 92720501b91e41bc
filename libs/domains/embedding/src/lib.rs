//! Embedding extraction against the external model server.
//!
//! Images and text land in one shared semantic space of fixed dimension D;
//! the model's architecture and numerics are not this crate's business.
//! Embeddings are ephemeral: they live between extraction and insertion and
//! are never cached or persisted here.

pub mod clip;
pub mod error;
pub mod extractor;

pub use clip::{ClipHttpExtractor, ModelConfig};
pub use error::ExtractionError;
#[cfg(any(test, feature = "mock"))]
pub use extractor::MockEmbeddingExtractor;
pub use extractor::EmbeddingExtractor;
