use domain_embedding::ExtractionError;
use domain_storage::StorageError;
use domain_vectordb::{InsertError, SearchError};
use thiserror::Error;

/// A tick failure that stopped the batch before relocation. Objects stay in
/// the landing bucket and are retried on the next tick.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to read pending uploads: {0}")]
    Landing(#[from] StorageError),

    #[error("embedding extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("vector insert failed: {0}")]
    Insert(#[from] InsertError),

    #[error(transparent)]
    Relocation(#[from] RelocationError),

    #[error("scheduler error: {0}")]
    Scheduler(String),
}

/// Per-object relocation failure. Inside a tick these are isolated and
/// counted, never propagated; the object is re-ingested on a later tick.
#[derive(Debug, Error)]
#[error("failed to relocate '{name}': {source}")]
pub struct RelocationError {
    pub name: String,
    #[source]
    pub source: StorageError,
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("embedding extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("vector search failed: {0}")]
    Search(#[from] SearchError),
}
