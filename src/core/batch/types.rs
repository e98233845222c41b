//! Batch payload types

use crate::core::headers::Headers;
use crate::core::transport::{HttpMethod, HttpResponse};

/// Response envelope for one request of a `$batch`
pub type ResponseEnvelope = HttpResponse;

/// One request inside a `$batch` payload
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRequestPart {
    pub method: HttpMethod,
    /// URL relative to the service root
    pub url: String,
    pub headers: Headers,
    pub body: Option<String>,
}

/// Top-level element of a `$batch` payload
#[derive(Debug, Clone, PartialEq)]
pub enum BatchPart {
    /// A request outside of any change set
    Request(BatchRequestPart),
    /// An atomic group of modifying requests
    ChangeSet(Vec<BatchRequestPart>),
}

impl BatchPart {
    /// Number of response envelopes this element expects
    pub fn request_count(&self) -> usize {
        match self {
            BatchPart::Request(_) => 1,
            BatchPart::ChangeSet(requests) => requests.len(),
        }
    }
}

/// Response to one top-level element of a `$batch`
#[derive(Debug, Clone, PartialEq)]
pub enum BatchResponsePart {
    /// A single response; also how servers answer a change set that failed as a whole
    Response(ResponseEnvelope),
    /// Responses of a change set's members, in request order
    ChangeSet(Vec<ResponseEnvelope>),
}

impl BatchResponsePart {
    pub fn into_envelopes(self) -> Vec<ResponseEnvelope> {
        match self {
            BatchResponsePart::Response(envelope) => vec![envelope],
            BatchResponsePart::ChangeSet(envelopes) => envelopes,
        }
    }
}

/// Serialized `$batch` body with the headers describing it
#[derive(Debug, Clone, PartialEq)]
pub struct SerializedBatch {
    pub body: String,
    /// `Content-Type` (with boundary) and `MIME-Version`
    pub headers: Headers,
}
