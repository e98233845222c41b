//! Type conversions for RequestorError

use super::types::{CommunicationError, RequestorError};

impl From<CommunicationError> for RequestorError {
    fn from(error: CommunicationError) -> Self {
        RequestorError::Communication(error)
    }
}

impl From<serde_json::Error> for RequestorError {
    fn from(error: serde_json::Error) -> Self {
        RequestorError::Serialization(error.to_string())
    }
}

impl From<serde_yaml::Error> for RequestorError {
    fn from(error: serde_yaml::Error) -> Self {
        RequestorError::Config(format!("Failed to parse config: {}", error))
    }
}

impl From<reqwest::Error> for RequestorError {
    fn from(error: reqwest::Error) -> Self {
        RequestorError::Network(error.to_string())
    }
}
