//! Validators for the requestor configuration

use super::trait_def::Validate;
use super::url::validate_service_url;
use crate::config::models::RequestorConfig;
use tracing::debug;

impl Validate for RequestorConfig {
    fn validate(&self) -> Result<(), String> {
        debug!("Validating requestor configuration");

        validate_service_url(&self.service_url)?;

        if self.timeout_secs == 0 {
            return Err("Timeout must be greater than 0".to_string());
        }

        if self.session_keep_alive_limit_secs == 0 {
            return Err("Session keep-alive limit must be greater than 0".to_string());
        }

        for (name, _) in self.headers.iter() {
            if name.is_empty() {
                return Err("Header names cannot be empty".to_string());
            }
        }

        for name in self.query_params.keys() {
            if name.is_empty() {
                return Err("Query parameter names cannot be empty".to_string());
            }
            if name.starts_with('$') {
                return Err(format!(
                    "System query option '{}' is not allowed in query_params",
                    name
                ));
            }
        }

        if self.groups.keys().any(String::is_empty) {
            return Err("Group ids cannot be empty".to_string());
        }

        Ok(())
    }
}
