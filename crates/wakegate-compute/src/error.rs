//! Instance API error types.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for instance API calls.
pub type ComputeResult<T> = Result<T, ComputeError>;

/// Errors that can occur while talking to the instance-management API.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("invalid endpoint {endpoint:?}: {reason}")]
    Endpoint { endpoint: String, reason: String },

    #[error("tls setup error: {0}")]
    Tls(String),

    #[error("http transport error: {0}")]
    Http(String),

    #[error("{method} {path} returned {code}: {body}")]
    Status {
        method: String,
        path: String,
        code: u16,
        body: String,
    },

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("operation {name} failed: {message}")]
    Operation { name: String, message: String },

    #[error("{what} timed out after {after:?}")]
    Timeout { what: String, after: Duration },

    #[error("{what} timeout {after:?} is out of range")]
    TimeoutOutOfRange { what: String, after: Duration },

    #[error("failed to obtain access token: {0}")]
    Auth(String),
}
