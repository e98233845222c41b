//! OData protocol version

use crate::core::headers::{DATA_SERVICE_VERSION, ODATA_VERSION};
use crate::utils::error::RequestorError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// OData protocol version spoken with the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ODataVersion {
    #[serde(rename = "2.0")]
    V2,
    #[default]
    #[serde(rename = "4.0")]
    V4,
}

impl ODataVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ODataVersion::V2 => "2.0",
            ODataVersion::V4 => "4.0",
        }
    }

    /// Response header carrying the protocol version
    pub fn version_header(&self) -> &'static str {
        match self {
            ODataVersion::V2 => DATA_SERVICE_VERSION,
            ODataVersion::V4 => ODATA_VERSION,
        }
    }

    /// Whether a change set with a single request may be sent without its wrapper
    pub fn change_set_optional(&self) -> bool {
        matches!(self, ODataVersion::V4)
    }
}

impl fmt::Display for ODataVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ODataVersion {
    type Err = RequestorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "2.0" => Ok(ODataVersion::V2),
            "4.0" => Ok(ODataVersion::V4),
            other => Err(RequestorError::config(format!(
                "Unsupported OData version: {}",
                other
            ))),
        }
    }
}
