//! # odata-requestor
//!
//! Request batching engine for OData V2 and V4 services.
//!
//! Callers issue requests independently; the [`Requestor`] decides how they travel:
//!
//! - **Groups**: requests of `Direct` groups (`$direct`) are sent at once, all others
//!   wait in a per-group queue until [`Requestor::submit_batch`] sends them as one `$batch`
//! - **Change sets**: modifying requests are grouped into atomic change sets; compatible
//!   PATCH requests to the same entity are merged into one
//! - **CSRF**: the security token is fetched on demand, shared by concurrent callers and
//!   refreshed once when the server rejects it
//! - **Sessions**: a server session context is kept alive by pings until it idles out
//! - **Cancellation**: queued changes can be canceled, removed or moved to another group
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use odata_requestor::{ConfiguredModel, GroupLock, ODataRequest, Requestor, RequestorConfig};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RequestorConfig::new("https://example.com/sap/opu/odata4/svc/")
//!         .with_query_param("sap-client", "100");
//!     let model = Arc::new(ConfiguredModel::new(&config));
//!     let requestor = Requestor::connect(config, model)?;
//!
//!     let lock = GroupLock::new("update");
//!     let read = requestor.request(ODataRequest::get("Products?$top=10"), Some(&lock))?;
//!     let change = requestor.request(
//!         ODataRequest::patch("Products('42')")
//!             .header("If-Match", "W/\"1\"")
//!             .body(json!({"Name": "Pencil"})),
//!         Some(&GroupLock::new("update")),
//!     )?;
//!
//!     requestor.submit_batch("update").await?;
//!     println!("{} / {}", read.await?, change.await?);
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod core;
pub mod utils;

pub use config::{ODataVersion, RequestorConfig};
pub use core::batch::{
    BatchCodec, BatchPart, BatchRequestPart, BatchResponsePart, MultipartBatchCodec,
    ResponseEnvelope,
};
pub use core::group_lock::GroupLock;
pub use core::headers::Headers;
pub use core::model::{ConfiguredModel, ModelInterface, SubmitMode};
pub use core::requestor::{ODataRequest, QueuedRequest, RequestHandle, RequestId, Requestor};
pub use core::transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use utils::error::{CommunicationError, RequestorError, Result};
