//! Error handling for the requestor
//!
//! This module defines the error taxonomy reported through request handles and
//! requestor operations.

mod conversions;
mod helpers;
mod types;

pub use types::{CommunicationError, RequestorError, Result};
