//! Model interface
//!
//! The requestor asks its surrounding model how a group is submitted and reports
//! server messages and session loss back to it. Every method has a default, so a
//! model only overrides what it cares about.

mod configured;
mod types;

pub use configured::ConfiguredModel;
pub use types::SubmitMode;

use crate::utils::error::{RequestorError, Result};
use async_trait::async_trait;
use serde_json::Value;

/// Callbacks from the requestor into the owning model
#[async_trait]
pub trait ModelInterface: Send + Sync {
    /// Submit mode of the given group
    fn group_submit_mode(&self, group_id: &str) -> SubmitMode {
        SubmitMode::for_group(group_id)
    }

    /// Called when the first request is queued for a group
    fn on_create_group(&self, _group_id: &str) {}

    /// Messages without a target, taken from the `sap-messages` response header
    fn report_unbound_messages(&self, _resource_path: &str, _messages: &[Value]) {}

    /// Messages with a target, taken from the `sap-messages` response header
    fn report_bound_messages(&self, _resource_path: &str, _messages: &[Value]) {}

    /// Called when the session keep-alive gives up after the idle limit
    fn on_session_timeout(&self) {}

    /// Metadata document (or fragment) for the given path
    async fn fetch_metadata(&self, path: &str) -> Result<Value> {
        Err(RequestorError::invalid_request(format!(
            "No metadata available for '{}'",
            path
        )))
    }
}
