//! Utility modules
//!
//! - **error**: the error taxonomy shared by every operation
//! - **logging**: subscriber setup and log sanitization

pub mod error;
pub mod logging;
