//! Configuration validation
//!
//! - `trait_def`: the Validate trait
//! - `url`: service URL checks
//! - `config_validators`: Validate for the requestor configuration

mod config_validators;
mod trait_def;
mod url;

pub use trait_def::Validate;
pub use self::url::validate_service_url;
