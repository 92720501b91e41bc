//! Vector-engine client and collection lifecycle management.
//!
//! The engine is an external collaborator reached over its REST API. Its
//! client has two call shapes — blocking control-plane operations
//! (provisioning, load/release, flush) and native-async data-plane
//! operations (insert, search) — which this crate drives through the
//! [`op_bridge::OpBridge`] so that callers see a single async operation
//! model.
//!
//! Provisioning is an idempotent state machine:
//!
//! ```text
//! UNINITIALIZED → DATABASE_READY → COLLECTION_READY → INDEX_READY
//!               → LOADED ⇄ RELEASED → CLOSED
//! ```
//!
//! Every `ensure_*` step re-enters cleanly: "already exists" answers from
//! the engine are success, not errors.

pub mod client;
pub mod error;
pub mod http;
pub mod manager;
pub mod schema;

pub use client::VectorStoreClient;
#[cfg(any(test, feature = "mock"))]
pub use client::MockVectorStoreClient;
pub use error::{InsertError, ProvisioningError, RpcError, SearchError};
pub use http::{HttpVectorStoreClient, VectorStoreConfig};
pub use manager::{CollectionHandle, CollectionManager, CollectionState};
pub use schema::{
    CollectionSchema, ColumnBatch, ColumnValues, DistanceMetric, IndexAlgorithm, IndexDescriptor,
    InsertOutcome, SearchHit, SearchRequest,
};
