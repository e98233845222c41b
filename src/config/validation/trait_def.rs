//! Validation trait definition

/// Validation of configuration structures; the error is a human readable reason
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}
