//! Model capability errors.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("Model API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Rate limited: retry after {retry_after_seconds} seconds")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("Model timed out after {0} seconds")]
    Timeout(u64),

    #[error("Model returned an empty completion")]
    EmptyCompletion,
}
