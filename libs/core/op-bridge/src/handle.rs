use tokio::task::JoinHandle;

use crate::error::BridgeError;

/// Deferred result of a bridged operation.
///
/// A handle is consumed at most once: [`join`](Self::join) takes `self` by
/// value, so a second await is a compile error rather than a runtime one.
/// Dropping a handle detaches the task — the remote call runs to completion,
/// only its local completion is discarded.
#[derive(Debug)]
pub struct OpHandle<T, E> {
    inner: HandleInner<T, E>,
}

#[derive(Debug)]
enum HandleInner<T, E> {
    Task(JoinHandle<Result<T, BridgeError<E>>>),
    /// Submission was refused because the bridge is shut down.
    Rejected,
}

impl<T, E> OpHandle<T, E> {
    pub(crate) fn from_task(task: JoinHandle<Result<T, BridgeError<E>>>) -> Self {
        Self {
            inner: HandleInner::Task(task),
        }
    }

    pub(crate) fn rejected() -> Self {
        Self {
            inner: HandleInner::Rejected,
        }
    }

    /// Wait for the operation to complete, exactly once.
    pub async fn join(self) -> Result<T, BridgeError<E>> {
        match self.inner {
            HandleInner::Rejected => Err(BridgeError::Shutdown),
            HandleInner::Task(task) => match task.await {
                Ok(result) => result,
                Err(join_err) if join_err.is_panic() => {
                    Err(BridgeError::Panicked(join_err.to_string()))
                }
                // Cancelled join means the runtime itself is going away.
                Err(_) => Err(BridgeError::Shutdown),
            },
        }
    }
}
