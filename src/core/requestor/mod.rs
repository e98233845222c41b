//! Request orchestration for one OData service
//!
//! The [`Requestor`] turns independently issued requests into HTTP calls: requests of
//! `Direct` groups are sent at once, all others wait in a per-group queue until
//! [`Requestor::submit_batch`] sends them as a single `$batch`. Along the way it merges
//! PATCH requests, keeps the CSRF token fresh and holds the server session alive.

mod cancel;
mod merge;
#[allow(clippy::module_inception)]
mod requestor;
mod send;
mod session;
mod submit;
mod types;

pub use requestor::{FETCH_TOKEN, Requestor, TokenRefresh, clean_payload};
pub use types::{Callback, ODataRequest, QueuedRequest, RequestHandle, RequestId};
