use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("extractor configuration error: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("model server returned HTTP {status}: {body}")]
    Model { status: u16, body: String },

    #[error("failed to decode model response: {0}")]
    Decode(String),

    #[error("model returned {actual} embeddings for {expected} inputs")]
    CountMismatch { expected: usize, actual: usize },

    #[error("model returned a {actual}-dimensional embedding, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl From<reqwest::Error> for ExtractionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ExtractionError::Decode(err.to_string())
        } else {
            ExtractionError::Transport(err.to_string())
        }
    }
}
