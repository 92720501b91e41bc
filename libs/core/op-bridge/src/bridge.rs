use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, Semaphore};
use tracing::{debug, warn};

use crate::error::BridgeError;
use crate::handle::OpHandle;

/// Bridge configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Concurrency bound for control-plane (blocking) operations.
    pub control_workers: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            control_workers: default_control_workers(),
        }
    }
}

/// Control-plane pool is sized to hardware parallelism, never below 4.
fn default_control_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
        .max(4)
}

struct Inner {
    control_permits: Arc<Semaphore>,
    closed: AtomicBool,
    in_flight: AtomicUsize,
    drained: Notify,
}

/// Unifies the store client's blocking and future-based call shapes into one
/// deferred-result abstraction over two executor pools.
#[derive(Clone)]
pub struct OpBridge {
    inner: Arc<Inner>,
}

impl OpBridge {
    pub fn new(config: BridgeConfig) -> Self {
        debug!(
            control_workers = config.control_workers,
            "Creating operation bridge"
        );
        Self {
            inner: Arc::new(Inner {
                control_permits: Arc::new(Semaphore::new(config.control_workers.max(1))),
                closed: AtomicBool::new(false),
                in_flight: AtomicUsize::new(0),
                drained: Notify::new(),
            }),
        }
    }

    /// Submit control-plane work that blocks its thread.
    ///
    /// The work waits for one of the bounded pool's permits, then runs on the
    /// runtime's blocking pool. Permits held by in-flight work survive
    /// shutdown so that draining can finish.
    pub fn submit_blocking<T, E, F>(&self, work: F) -> OpHandle<T, E>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        if self.inner.closed.load(Ordering::Acquire) {
            return OpHandle::rejected();
        }

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let _guard = InFlightGuard::enter(&inner);
            let permit = Arc::clone(&inner.control_permits)
                .acquire_owned()
                .await
                .map_err(|_| BridgeError::Shutdown)?;

            let joined = tokio::task::spawn_blocking(work).await;
            drop(permit);
            match joined {
                Ok(result) => result.map_err(BridgeError::Op),
                Err(join_err) if join_err.is_panic() => {
                    Err(BridgeError::Panicked(join_err.to_string()))
                }
                Err(_) => Err(BridgeError::Shutdown),
            }
        });
        OpHandle::from_task(task)
    }

    /// Submit a data-plane operation with a native async form.
    ///
    /// Runs unbounded on the runtime; the engine's data path is expected to
    /// absorb its own backpressure.
    pub fn submit_async<T, E, Fut>(&self, fut: Fut) -> OpHandle<T, E>
    where
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        if self.inner.closed.load(Ordering::Acquire) {
            return OpHandle::rejected();
        }

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let _guard = InFlightGuard::enter(&inner);
            fut.await.map_err(BridgeError::Op)
        });
        OpHandle::from_task(task)
    }

    /// Number of operations currently tracked by the bridge.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Graceful shutdown: refuse new submissions, then wait up to `timeout`
    /// for in-flight operations to drain.
    ///
    /// Returns `true` when fully drained, `false` on the force-stop fallback
    /// (remaining operations keep running detached; the engine's RPCs cannot
    /// be cancelled). Idempotent and safe to call from an exit hook.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.inner.closed.store(true, Ordering::Release);

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.inner.drained.notified();
            let remaining = self.inner.in_flight.load(Ordering::Acquire);
            if remaining == 0 {
                debug!("Operation bridge drained");
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                warn!(
                    remaining,
                    "Operation bridge shutdown timed out, abandoning in-flight operations"
                );
                return false;
            }
        }
    }
}

/// RAII in-flight tracking; notifies shutdown waiters when the count drops
/// to zero.
struct InFlightGuard<'a> {
    inner: &'a Inner,
}

impl<'a> InFlightGuard<'a> {
    fn enter(inner: &'a Inner) -> Self {
        inner.in_flight.fetch_add(1, Ordering::AcqRel);
        Self { inner }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if self.inner.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.inner.drained.notify_waiters();
        }
    }
}
