//! Requestor configuration

use super::ODataVersion;
use crate::core::headers::Headers;
use crate::core::model::SubmitMode;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Default idle time after which the session keep-alive gives up, in seconds
pub fn default_session_keep_alive_limit() -> u64 {
    30 * 60
}

/// Default HTTP timeout in seconds
pub fn default_timeout() -> u64 {
    60
}

/// Configuration of one service connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestorConfig {
    /// Absolute service root URL, ending with `/`
    pub service_url: String,
    /// Protocol version
    pub odata_version: ODataVersion,
    /// Custom headers sent with every request
    pub headers: Headers,
    /// Query parameters appended to `$batch`, token fetch and keep-alive requests
    pub query_params: BTreeMap<String, String>,
    /// Overrides whether single-request change sets are unwrapped
    pub change_set_optional: Option<bool>,
    /// Idle time after which the session keep-alive stops
    pub session_keep_alive_limit_secs: u64,
    /// HTTP timeout of the default transport
    pub timeout_secs: u64,
    /// User agent of the default transport
    pub user_agent: Option<String>,
    /// Submit modes by group id
    pub groups: HashMap<String, SubmitMode>,
}

impl Default for RequestorConfig {
    fn default() -> Self {
        Self {
            service_url: String::new(),
            odata_version: ODataVersion::default(),
            headers: Headers::new(),
            query_params: BTreeMap::new(),
            change_set_optional: None,
            session_keep_alive_limit_secs: default_session_keep_alive_limit(),
            timeout_secs: default_timeout(),
            user_agent: None,
            groups: HashMap::new(),
        }
    }
}

impl RequestorConfig {
    pub fn new(service_url: impl Into<String>) -> Self {
        Self {
            service_url: service_url.into(),
            ..Default::default()
        }
    }

    pub fn with_version(mut self, odata_version: ODataVersion) -> Self {
        self.odata_version = odata_version;
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.insert(name.into(), value.into());
        self
    }

    pub fn with_group(mut self, group_id: impl Into<String>, mode: SubmitMode) -> Self {
        self.groups.insert(group_id.into(), mode);
        self
    }

    pub fn with_change_set_optional(mut self, optional: bool) -> Self {
        self.change_set_optional = Some(optional);
        self
    }

    pub fn with_session_keep_alive_limit(mut self, seconds: u64) -> Self {
        self.session_keep_alive_limit_secs = seconds;
        self
    }

    /// Effective change-set elision, falling back to the protocol default
    pub fn is_change_set_optional(&self) -> bool {
        self.change_set_optional
            .unwrap_or_else(|| self.odata_version.change_set_optional())
    }
}
