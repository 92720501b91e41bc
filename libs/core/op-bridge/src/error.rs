use thiserror::Error;

/// Single failure channel for bridged operations.
///
/// Whatever the underlying client raised — a transport error or a remote
/// "status: failure" response carried in `E` — callers handle it through
/// this one type.
#[derive(Debug, Error)]
pub enum BridgeError<E> {
    /// The submitted operation itself failed.
    #[error("operation failed: {0}")]
    Op(E),

    /// The bridge was shut down before the operation could complete locally.
    #[error("operation bridge is shut down")]
    Shutdown,

    /// The operation panicked on its worker.
    #[error("bridged operation panicked: {0}")]
    Panicked(String),
}

impl<E> BridgeError<E> {
    /// Unwrap the operation error, mapping bridge-level failures through `f`.
    pub fn into_op_error(self, f: impl FnOnce(String) -> E) -> E {
        match self {
            BridgeError::Op(e) => e,
            BridgeError::Shutdown => f("operation bridge is shut down".to_string()),
            BridgeError::Panicked(msg) => f(msg),
        }
    }
}
