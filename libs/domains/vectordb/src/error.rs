use thiserror::Error;

/// Failure talking to the vector engine.
///
/// A remote "status: failure" response ([`RpcError::Status`]) is distinct
/// from a transport failure but travels the same channel, so callers need a
/// single error-handling path regardless of which API shape produced it.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("engine returned failure status {code}: {message}")]
    Status { code: i64, message: String },

    #[error("failed to decode engine response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for RpcError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RpcError::Decode(err.to_string())
        } else {
            RpcError::Transport(err.to_string())
        }
    }
}

/// Database/collection/index setup failed for a reason other than
/// "already exists". Fatal during startup.
#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error("schema validation failed: {0}")]
    InvalidSchema(String),

    #[error("collection '{collection}' already exists with a different schema: {details}")]
    SchemaMismatch { collection: String, details: String },

    #[error("collection handle is closed")]
    Closed,

    #[error("provisioning call failed: {0}")]
    Rpc(#[from] RpcError),
}

#[derive(Debug, Error)]
pub enum InsertError {
    #[error("insert columns must have equal lengths: {0}")]
    ColumnLengthMismatch(String),

    #[error("collection handle is closed")]
    Closed,

    #[error("insert call failed: {0}")]
    Rpc(#[from] RpcError),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("collection must be loaded before search")]
    NotLoaded,

    #[error("search call failed: {0}")]
    Rpc(#[from] RpcError),
}

pub type RpcResult<T> = Result<T, RpcError>;
