use super::{ModelInterface, SubmitMode};
use crate::config::RequestorConfig;
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;

/// Model that resolves submit modes from configuration and ignores every notification
#[derive(Debug, Clone, Default)]
pub struct ConfiguredModel {
    groups: HashMap<String, SubmitMode>,
}

impl ConfiguredModel {
    pub fn new(config: &RequestorConfig) -> Self {
        Self {
            groups: config.groups.clone(),
        }
    }

    pub fn with_group(mut self, group_id: impl Into<String>, mode: SubmitMode) -> Self {
        self.groups.insert(group_id.into(), mode);
        self
    }
}

#[async_trait]
impl ModelInterface for ConfiguredModel {
    fn group_submit_mode(&self, group_id: &str) -> SubmitMode {
        self.groups
            .get(group_id)
            .copied()
            .unwrap_or_else(|| SubmitMode::for_group(group_id))
    }

    fn on_create_group(&self, group_id: &str) {
        debug!("Created queue for group '{}'", group_id);
    }
}
