//! HTTP transport abstraction
//!
//! All network I/O of the requestor is funneled through a single injectable
//! [`HttpTransport`]. A transport reports every HTTP response, whatever its status,
//! as `Ok`; only failures that produced no response at all are `Err`.

mod reqwest_transport;
mod types;

pub use reqwest_transport::ReqwestTransport;
pub use types::{HttpMethod, HttpRequest, HttpResponse};

use crate::utils::error::Result;
use async_trait::async_trait;

/// Single-call HTTP function injected into the requestor
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends one request and returns the response, including error statuses
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}
