//! Helper functions for creating and inspecting errors

use super::types::{CommunicationError, RequestorError};
use crate::core::headers::{CONTENT_TYPE, Headers};
use serde_json::Value;

impl RequestorError {
    pub fn canceled<S: Into<String>>(message: S) -> Self {
        Self::Canceled(message.into())
    }

    pub fn cached<M: ToString, P: Into<String>>(method: M, resource_path: P) -> Self {
        Self::Cached {
            method: method.to_string(),
            resource_path: resource_path.into(),
        }
    }

    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network(message.into())
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    pub fn invalid_request<S: Into<String>>(message: S) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn batch_running<S: Into<String>>(message: S) -> Self {
        Self::BatchRunning(message.into())
    }

    pub fn batch_format<S: Into<String>>(message: S) -> Self {
        Self::BatchFormat(message.into())
    }

    pub fn previous_request_failed(cause: RequestorError) -> Self {
        Self::PreviousRequestFailed {
            cause: Box::new(cause),
        }
    }

    pub fn batch_failed(cause: RequestorError) -> Self {
        Self::BatchFailed {
            cause: Box::new(cause),
        }
    }

    /// True for deliberate cancellation, as opposed to a real failure
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled(_))
    }

    /// True for a request against the `$cached` group
    pub fn is_cached(&self) -> bool {
        matches!(self, Self::Cached { .. })
    }

    /// HTTP status of the root communication error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Communication(error) => error.status,
            Self::PreviousRequestFailed { cause } | Self::BatchFailed { cause } => cause.status(),
            _ => None,
        }
    }

    /// The wrapped error of a chained failure
    pub fn cause(&self) -> Option<&RequestorError> {
        match self {
            Self::PreviousRequestFailed { cause } | Self::BatchFailed { cause } => Some(cause),
            _ => None,
        }
    }

    /// The structured communication error, looking through chained failures
    pub fn communication(&self) -> Option<&CommunicationError> {
        match self {
            Self::Communication(error) => Some(error),
            Self::PreviousRequestFailed { cause } | Self::BatchFailed { cause } => {
                cause.communication()
            }
            _ => None,
        }
    }
}

impl CommunicationError {
    /// Error for a request that never produced an HTTP response
    pub fn transport(
        message: impl Into<String>,
        request_url: Option<&str>,
        resource_path: Option<&str>,
    ) -> Self {
        Self {
            message: message.into(),
            status: None,
            status_text: None,
            error: None,
            request_url: request_url.map(str::to_string),
            resource_path: resource_path.map(str::to_string),
        }
    }

    /// Builds the error for a failed HTTP response.
    ///
    /// The message is taken from the OData error payload (`error.message`, or
    /// `error.message.value` for V2 services) or from a `text/plain` body; otherwise
    /// `fallback` plus the status line is used.
    pub fn from_response(
        status: u16,
        status_text: &str,
        headers: &Headers,
        body: Option<&str>,
        fallback: &str,
        request_url: Option<&str>,
        resource_path: Option<&str>,
    ) -> Self {
        let content_type = headers
            .get(CONTENT_TYPE)
            .unwrap_or_default()
            .to_ascii_lowercase();
        let body = body.map(str::trim).filter(|text| !text.is_empty());

        let mut message = None;
        let mut error = None;
        if let Some(text) = body {
            if content_type.starts_with("application/json") {
                if let Ok(Value::Object(mut payload)) = serde_json::from_str::<Value>(text) {
                    if let Some(detail) = payload.remove("error") {
                        message = match detail.get("message") {
                            Some(Value::String(text)) => Some(text.clone()),
                            Some(Value::Object(v2)) => {
                                v2.get("value").and_then(Value::as_str).map(str::to_string)
                            }
                            _ => None,
                        };
                        error = Some(detail);
                    }
                }
            } else if content_type.starts_with("text/plain") {
                message = Some(text.to_string());
            }
        }

        let message = message.unwrap_or_else(|| {
            if status_text.is_empty() {
                format!("{}: {}", fallback, status)
            } else {
                format!("{}: {} {}", fallback, status, status_text)
            }
        });

        Self {
            message,
            status: Some(status),
            status_text: (!status_text.is_empty()).then(|| status_text.to_string()),
            error,
            request_url: request_url.map(str::to_string),
            resource_path: resource_path.map(str::to_string),
        }
    }
}
