use crate::utils::error::{RequestorError, Result};
use tracing_subscriber::EnvFilter;

/// Output format of the default subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Installs a `fmt` subscriber filtered at `level` (e.g. `"info"` or
/// `"odata_requestor=debug"`). `RUST_LOG` takes precedence when set.
///
/// Calling it again once a global subscriber exists is a no-op.
pub fn init_logging(level: &str) -> Result<()> {
    init_logging_with_format(level, LogFormat::Text)
}

pub fn init_logging_with_format(level: &str, format: LogFormat) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .map_err(|e| RequestorError::config(format!("Invalid log filter '{}': {}", level, e)))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false);

    // an installed subscriber is kept
    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    Ok(())
}
