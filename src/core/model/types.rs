use serde::{Deserialize, Serialize};
use std::fmt;

/// How requests of a group reach the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubmitMode {
    /// Sent immediately, one HTTP call per request
    Direct,
    /// Queued and submitted by the environment
    Auto,
    /// Queued until the application calls `submit_batch`
    #[serde(rename = "API")]
    Api,
}

impl SubmitMode {
    /// Mode implied by the reserved group names
    ///
    /// `$direct` is direct, `$auto` and its `$auto.<name>` variants are automatic,
    /// every other group is application controlled.
    pub fn for_group(group_id: &str) -> Self {
        if group_id == "$direct" {
            SubmitMode::Direct
        } else if group_id == "$auto" || group_id.starts_with("$auto.") {
            SubmitMode::Auto
        } else {
            SubmitMode::Api
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubmitMode::Direct => "Direct",
            SubmitMode::Auto => "Auto",
            SubmitMode::Api => "API",
        }
    }
}

impl fmt::Display for SubmitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
