//! Domain error type shared across components.
//!
//! Mirrors the error kinds enumerated in the error-handling design: remote
//! calls are retryable, malformed LLM output degrades to heuristics rather
//! than failing the ask, and only the outermost worker loop turns an error
//! into a queue `fail`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AskError {
    #[error("transient remote failure: {0}")]
    TransientRemote(String),

    #[error("chat transport rejected the request: {0}")]
    TransportRejected(String),

    #[error("database unavailable: {0}")]
    DatabaseUnavailable(String),

    #[error("quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("malformed response from language model: {0}")]
    MalformedLlmResponse(String),

    #[error("empty input after normalization")]
    EmptyInput,

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type AskResult<T> = Result<T, AskError>;

impl AskError {
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::TransientRemote(msg.into())
    }

    pub fn quota_exhausted(msg: impl Into<String>) -> Self {
        Self::QuotaExhausted(msg.into())
    }

    /// Whether the queue should retry this failure at all. `EmptyInput` and
    /// `QuotaExhausted` are final; everything transient is retryable.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::EmptyInput | Self::QuotaExhausted(_))
    }
}
