//! Error types for the requestor

use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Result type alias for the requestor
pub type Result<T> = std::result::Result<T, RequestorError>;

/// Main error type for the requestor
///
/// Errors are `Clone` because a single wire response may settle several callers
/// (merged PATCH requests) and change-set failures are chained into their successors.
#[derive(Error, Debug, Clone)]
pub enum RequestorError {
    /// Transport-level failure or non-success HTTP status
    #[error("{0}")]
    Communication(CommunicationError),

    /// A preceding request of the same change set failed
    #[error("HTTP request was not processed because the previous request failed")]
    PreviousRequestFailed { cause: Box<RequestorError> },

    /// The whole `$batch` call failed
    #[error("HTTP request was not processed because $batch failed")]
    BatchFailed { cause: Box<RequestorError> },

    /// Deliberate cancellation
    #[error("{0}")]
    Canceled(String),

    /// Request against the `$cached` group
    #[error("Unexpected request: {method} {resource_path}")]
    Cached {
        method: String,
        resource_path: String,
    },

    /// Response protocol version does not match the configured one
    #[error(
        "Expected '{header}' header with value '{expected}' but received {received} in response for {url}"
    )]
    VersionMismatch {
        header: &'static str,
        expected: &'static str,
        received: String,
        url: String,
    },

    /// Network errors raised by a transport
    #[error("Network error: {0}")]
    Network(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid request errors
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Operation refused because the group's batch is in flight
    #[error("{0}")]
    BatchRunning(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Malformed multipart payload
    #[error("Batch format error: {0}")]
    BatchFormat(String),
}

/// Structured communication error
#[derive(Debug, Clone, PartialEq)]
pub struct CommunicationError {
    /// Human readable message, taken from the server payload when available
    pub message: String,
    /// HTTP status code, absent for network failures
    pub status: Option<u16>,
    /// HTTP status text
    pub status_text: Option<String>,
    /// Parsed server error payload (the `error` member of an OData error response)
    pub error: Option<Value>,
    /// Absolute URL of the failed request
    pub request_url: Option<String>,
    /// Caller-supplied resource path, for diagnostics
    pub resource_path: Option<String>,
}

impl fmt::Display for CommunicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CommunicationError {}
