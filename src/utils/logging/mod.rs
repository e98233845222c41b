//! Logging utilities
//!
//! The crate logs through `tracing`; installing a subscriber is left to the
//! application, with [`init_logging`] as a ready-made default.

mod sanitization;
mod subscriber;

pub use sanitization::Sanitization;
pub use subscriber::{LogFormat, init_logging, init_logging_with_format};
