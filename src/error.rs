//! Error types for the asset client

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Client error types
///
/// Non-Clone sources are held behind `Arc`.
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[source] Arc<reqwest::Error>),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    /// Business failure reported through the response envelope.
    /// Displays as the server's message, verbatim.
    #[error("{message}")]
    Api { code: i64, message: String },

    #[error("No session: refresh token is missing")]
    NoSession,

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Invalid token: {0}")]
    Decode(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Serialization error: {0}")]
    Serialization(#[source] Arc<serde_json::Error>),

    #[error("Token storage error: {0}")]
    Storage(#[source] Arc<std::io::Error>),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Classify a reqwest failure, keeping timeouts apart from other transport errors
    pub fn from_transport(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            ClientError::Timeout(timeout)
        } else {
            ClientError::HttpRequest(Arc::new(err))
        }
    }

    /// True for failures that come from the network layer rather than the server.
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::HttpRequest(_) | ClientError::Timeout(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::HttpRequest(Arc::new(err))
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Serialization(Arc::new(err))
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::Storage(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
