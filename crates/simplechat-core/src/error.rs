//! Error types for simplechat-core

use thiserror::Error;

/// Errors returned by the backend client and configuration layer
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status. `body` is the raw response text, possibly empty.
    #[error("{}", status_message(.body))]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("health check failed")]
    HealthCheck,

    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Config(String),
}

fn status_message(body: &str) -> &str {
    if body.trim().is_empty() {
        "request failed"
    } else {
        body
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ApiError>;
