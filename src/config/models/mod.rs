//! Configuration data models

mod requestor;
mod version;

pub use requestor::*;
pub use version::ODataVersion;
