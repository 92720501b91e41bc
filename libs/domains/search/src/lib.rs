//! Similarity-search orchestration: the scheduled ingestion pipeline and
//! the query service.
//!
//! Ingestion is at-least-once: every image uploaded to the landing bucket is
//! eventually embedded, inserted and relocated, and a crash mid-tick means
//! re-insertion rather than loss. Queries run against whatever has been
//! flushed so far.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod query;

pub use error::{PipelineError, QueryError, RelocationError};
pub use models::{ImageExtension, ImageMatch, TickOutcome, TickSummary};
pub use pipeline::IngestionPipeline;
pub use query::{ImageUpload, QueryService};
