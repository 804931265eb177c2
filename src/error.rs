//! Error types for the recall crate

use thiserror::Error;

/// Result type for recall operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for recall operations
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// API returned an error response
    #[error("API error: {status_code} - {message}")]
    Api {
        /// HTTP status code
        status_code: u16,
        /// Error message
        message: String,
    },

    /// Authentication error
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded. Please retry after {retry_after_secs} seconds")]
    RateLimit {
        /// Seconds to wait before retrying
        retry_after_secs: u64,
    },

    /// Unexpected response format
    #[error("Unexpected response format: {0}")]
    UnexpectedResponse(String),

    /// Knowledge store error
    #[error("Store error: {0}")]
    Store(String),

    /// Vector index error
    #[error("Index error: {0}")]
    Index(String),

    /// Document extraction error
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Document source error
    #[error("Source error: {0}")]
    Source(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}
