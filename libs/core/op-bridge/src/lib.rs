//! Deferred-result bridge over the vector engine's two client call shapes.
//!
//! The remote store exposes some operations as plain blocking calls
//! (provisioning, flush, load/release) and others as native futures
//! (insert, search). This crate unifies both behind one handle type:
//!
//! - [`OpBridge::submit_blocking`] runs control-plane work on a bounded
//!   pool sized to available parallelism (minimum 4), so slow
//!   administrative calls cannot starve data-plane throughput.
//! - [`OpBridge::submit_async`] runs data-plane futures directly on the
//!   runtime, unbounded.
//!
//! Every submission yields an [`OpHandle`] that completes exactly once with
//! either a value or a normalized [`BridgeError`], regardless of which pool
//! or API shape produced it.
//!
//! Abandoning a handle only suppresses local completion; the underlying
//! remote call still runs to completion. The engine's RPCs have no
//! cancellation primitive, so this is a documented limitation rather than
//! something the bridge can fix.

mod bridge;
mod error;
mod handle;

pub use bridge::{BridgeConfig, OpBridge};
pub use error::BridgeError;
pub use handle::OpHandle;
