//! `$batch` wire format
//!
//! The requestor consumes the wire format through the [`BatchCodec`] contract;
//! [`MultipartBatchCodec`] is the `multipart/mixed` implementation used by default.

mod multipart;
mod types;

pub use multipart::MultipartBatchCodec;
pub use types::{BatchPart, BatchRequestPart, BatchResponsePart, ResponseEnvelope, SerializedBatch};

use crate::utils::error::Result;

/// Serializer/deserializer for `$batch` payloads
pub trait BatchCodec: Send + Sync {
    /// Serializes the top-level elements of one batch
    fn serialize_batch_request(&self, parts: &[BatchPart]) -> Result<SerializedBatch>;

    /// Deserializes a batch response into one part per top-level element, in request
    /// order.
    ///
    /// A change set that failed as a whole may be answered by a single response or by
    /// fewer envelopes than it has members.
    fn deserialize_batch_response(
        &self,
        content_type: &str,
        body: &str,
    ) -> Result<Vec<BatchResponsePart>>;
}
