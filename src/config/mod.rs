//! Configuration management for the requestor
//!
//! A [`RequestorConfig`] is loaded from YAML or from the environment and validated
//! before a requestor is built from it.

pub mod models;
pub mod validation;

pub use models::*;
pub use validation::Validate;

use crate::utils::error::{RequestorError, Result};
use std::env;
use std::path::Path;
use tracing::{debug, info};

const ENV_SERVICE_URL: &str = "ODATA_SERVICE_URL";
const ENV_VERSION: &str = "ODATA_VERSION";
const ENV_QUERY_PARAMS: &str = "ODATA_QUERY_PARAMS";
const ENV_TIMEOUT_SECS: &str = "ODATA_TIMEOUT_SECS";

impl RequestorConfig {
    /// Load configuration from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {:?}", path);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| RequestorError::Config(format!("Failed to read config file: {}", e)))?;

        let config: RequestorConfig = serde_yaml::from_str(&content)
            .map_err(|e| RequestorError::Config(format!("Failed to parse config: {}", e)))?;

        config.check()?;

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Load configuration from environment variables, reading `.env` first if present
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        if let Err(e) = dotenvy::dotenv() {
            debug!("No .env file loaded: {}", e);
        }

        let service_url = get_env_var(ENV_SERVICE_URL).ok_or_else(|| {
            RequestorError::Config(format!("{} is not set", ENV_SERVICE_URL))
        })?;
        let mut config = RequestorConfig::new(service_url);

        if let Some(version) = get_env_var(ENV_VERSION) {
            config.odata_version = version.parse()?;
        }

        if let Some(query) = get_env_var(ENV_QUERY_PARAMS) {
            config.query_params = url::form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect();
        }

        if let Some(timeout) = get_env_var(ENV_TIMEOUT_SECS) {
            config.timeout_secs = timeout.parse().map_err(|e| {
                RequestorError::Config(format!("Invalid {}: {}", ENV_TIMEOUT_SECS, e))
            })?;
        }

        config.check()?;
        Ok(config)
    }

    /// Validate and convert the reason into a configuration error
    pub fn check(&self) -> Result<()> {
        Validate::validate(self).map_err(RequestorError::Config)
    }

    /// Convert to YAML string
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| RequestorError::Config(format!("Failed to serialize config to YAML: {}", e)))
    }
}

fn get_env_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}
