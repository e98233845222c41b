//! Core functionality of the requestor
//!
//! This module contains the request engine and the collaborators it talks to.

pub mod batch;
pub mod group_lock;
pub mod headers;
pub mod model;
pub mod requestor;
pub mod transport;
