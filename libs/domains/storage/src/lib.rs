//! Bucket-scoped object storage.
//!
//! The storage service is an external collaborator; this crate owns only the
//! capability interface ([`ObjectStore`]) and a small per-role wrapper
//! ([`BucketStore`]) that binds a bucket name, batch size and public-read
//! policy to one logical role (landing, destination). Roles are composed,
//! not inherited: the same store client backs every bucket.

pub mod bucket;
pub mod error;
pub mod http;
pub mod memory;
pub mod store;

pub use bucket::{BucketConfig, BucketStore};
pub use error::StorageError;
pub use http::{HttpObjectStore, ObjectStoreConfig};
pub use memory::MemoryObjectStore;
#[cfg(any(test, feature = "mock"))]
pub use store::MockObjectStore;
pub use store::{ObjectStore, PendingObject};
