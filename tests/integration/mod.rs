//! Integration tests for odata-requestor
//!
//! These tests drive a requestor through its public API with the real multipart
//! codec and either a scripted transport or `reqwest` against a mock server.

pub mod batching_tests;
pub mod config_tests;
pub mod reqwest_transport_tests;
pub mod security_token_tests;
