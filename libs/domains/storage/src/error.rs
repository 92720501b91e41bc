use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("object store returned HTTP {status} for '{path}'")]
    Status { status: u16, path: String },

    #[error("'{0}' not found")]
    NotFound(String),

    #[error("failed to decode store response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            StorageError::Decode(err.to_string())
        } else {
            StorageError::Transport(err.to_string())
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
