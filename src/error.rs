//! Error types for fleet backend calls.

use thiserror::Error;

/// Errors that can occur when talking to the fleet backend.
///
/// All of these are transient from the engine's point of view: a failed
/// fetch skips that tank for the current poll, a failed acknowledge or
/// audit append is retried and then dropped.
#[derive(Debug, Error)]
pub enum SourceError {
    /// HTTP request failed or returned an error status.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Timeout waiting for response.
    #[error("Request timed out")]
    Timeout,

    /// The ship or tank is unknown to the backend.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Reading a local fleet document failed.
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure injected by an in-memory source.
    #[error("Unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout
        } else if err.is_connect() {
            SourceError::Connection(err.to_string())
        } else if err.is_decode() {
            SourceError::Parse(err.to_string())
        } else {
            SourceError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(err.to_string())
    }
}
