//! Batch submission and response distribution

use super::merge::clean_up_change_sets;
use super::requestor::{Requestor, parse_response_body, serialize_payload, with_etag};
use super::types::{BatchEntry, QueuedRequest, RunningBatch};
use crate::core::batch::{BatchPart, BatchRequestPart, BatchResponsePart, ResponseEnvelope};
use crate::core::headers::{ACCEPT, ETAG, IF_MATCH, SAP_MESSAGES};
use crate::core::transport::HttpMethod;
use crate::utils::error::{CommunicationError, RequestorError, Result};
use serde_json::Value;
use tracing::{debug, warn};

impl Requestor {
    /// Sends all queued requests of a group as one `$batch`.
    ///
    /// Waits for locked group locks of the group first. An empty group resolves
    /// without any HTTP call. If the `$batch` itself fails, every request of it fails
    /// with that cause and so does this call.
    pub async fn submit_batch(&self, group_id: &str) -> Result<()> {
        let waits: Vec<_> = {
            let mut state = self.inner.state.lock();
            state.locked_group_locks.retain(|lock| lock.is_locked());
            state
                .locked_group_locks
                .iter()
                .map(|lock| lock.wait_for(group_id))
                .collect()
        };
        futures::future::join_all(waits).await;

        let queue = {
            let mut state = self.inner.state.lock();
            state.queues.remove(group_id)
        };
        let Some(queue) = queue else {
            return Ok(());
        };

        let (mut entries, has_changes) =
            clean_up_change_sets(queue, self.inner.config.is_change_set_optional());
        if entries.is_empty() {
            return Ok(());
        }

        for entry in entries.iter_mut() {
            match entry {
                BatchEntry::Single(request) => run_on_submit(request),
                BatchEntry::ChangeSet(requests) => requests.iter_mut().for_each(run_on_submit),
            }
        }

        let batch_id = has_changes.then(|| self.register_running_batch(group_id, &entries));
        debug!(
            "Submitting {} batch entries for group '{}'",
            entries.len(),
            group_id
        );
        // only the serialized parts cross the await; callbacks are not `Sync`
        let parts = to_parts(&entries);
        let result = match parts {
            Ok(parts) => self.send_batch(parts).await,
            Err(error) => Err(error),
        };
        if let Some(batch_id) = batch_id {
            let mut state = self.inner.state.lock();
            state.running.retain(|batch| batch.id != batch_id);
        }

        match result {
            Ok(envelopes) => {
                self.distribute(entries, envelopes);
                Ok(())
            }
            Err(cause) => {
                warn!("$batch for group '{}' failed: {}", group_id, cause);
                for entry in entries {
                    match entry {
                        BatchEntry::Single(request) => {
                            request.reject(RequestorError::batch_failed(cause.clone()))
                        }
                        BatchEntry::ChangeSet(requests) => {
                            for request in requests {
                                request.reject(RequestorError::batch_failed(cause.clone()));
                            }
                        }
                    }
                }
                Err(cause)
            }
        }
    }

    fn register_running_batch(&self, group_id: &str, entries: &[BatchEntry]) -> u64 {
        let changes: Vec<&QueuedRequest> = entries
            .iter()
            .flat_map(|entry| match entry {
                BatchEntry::Single(request) => std::slice::from_ref(request),
                BatchEntry::ChangeSet(requests) => requests.as_slice(),
            })
            .filter(|request| !request.method.is_get())
            .collect();
        let entities = changes
            .iter()
            .map(|request| request.headers.get(IF_MATCH).map(str::to_string))
            .collect();
        let request_ids = changes.iter().map(|request| request.id).collect();

        let mut state = self.inner.state.lock();
        state.next_batch_id += 1;
        let id = state.next_batch_id;
        state.running.push(RunningBatch {
            id,
            group_id: group_id.to_string(),
            entities,
            request_ids,
        });
        id
    }

    async fn send_batch(&self, parts: Vec<BatchPart>) -> Result<Vec<BatchResponsePart>> {
        let batch = self.inner.codec.serialize_batch_request(&parts)?;
        let resource_path = format!("$batch{}", self.inner.query_string);
        let headers = batch.headers.with(ACCEPT, "multipart/mixed");

        let response = self
            .send_request(
                HttpMethod::Post,
                &resource_path,
                headers,
                Some(batch.body),
                &resource_path,
            )
            .await?;

        if response.headers.contains(SAP_MESSAGES) {
            return Err(RequestorError::batch_format(
                "Unexpected 'sap-messages' response header for batch request",
            ));
        }

        let content_type = response.content_type.unwrap_or_default();
        self.inner
            .codec
            .deserialize_batch_response(&content_type, response.body.as_deref().unwrap_or_default())
    }

    /// Settles every request from the response parts, in request order.
    ///
    /// Each entry consumes only the response part at its own position. Within a change
    /// set the first failure ends the consumption of envelopes; the remaining members
    /// fail with a chained error.
    fn distribute(&self, entries: Vec<BatchEntry>, responses: Vec<BatchResponsePart>) {
        let mut responses = responses.into_iter();

        for entry in entries {
            let mut envelopes = responses
                .next()
                .map(BatchResponsePart::into_envelopes)
                .unwrap_or_default()
                .into_iter();
            match entry {
                BatchEntry::Single(request) => {
                    self.settle(request, envelopes.next());
                }
                BatchEntry::ChangeSet(requests) => {
                    let mut failure: Option<RequestorError> = None;
                    for request in requests {
                        match &failure {
                            Some(cause) => {
                                request.reject(RequestorError::previous_request_failed(cause.clone()))
                            }
                            None => failure = self.settle(request, envelopes.next()),
                        }
                    }
                }
            }
        }
    }

    /// Settles one request; returns the error if the server rejected it
    fn settle(
        &self,
        request: QueuedRequest,
        envelope: Option<ResponseEnvelope>,
    ) -> Option<RequestorError> {
        let url = format!("{}{}", self.inner.config.service_url, request.url);

        let Some(envelope) = envelope else {
            let error = RequestorError::batch_format(format!(
                "Missing response for {} {}",
                request.method, url
            ));
            request.reject(error.clone());
            return Some(error);
        };

        if !envelope.is_success() {
            let error: RequestorError = CommunicationError::from_response(
                envelope.status,
                &envelope.status_text,
                &envelope.headers,
                envelope.body.as_deref(),
                "Communication error",
                Some(&url),
                Some(&request.resource_path),
            )
            .into();
            request.reject(error.clone());
            return Some(error);
        }

        match self.convert_envelope(&request, &envelope, &url) {
            Ok(value) => request.resolve(value),
            Err(error) => request.reject(error),
        }
        None
    }

    fn convert_envelope(
        &self,
        request: &QueuedRequest,
        envelope: &ResponseEnvelope,
        url: &str,
    ) -> Result<Value> {
        let text = envelope.text();
        if text.is_some() {
            self.check_version_header(&envelope.headers, url, true)?;
        }
        let value = parse_response_body(request.method, text)?;

        self.report_header_messages(&request.resource_path, envelope.header(SAP_MESSAGES))?;

        Ok(with_etag(value, envelope.header(ETAG)))
    }
}

fn run_on_submit(request: &mut QueuedRequest) {
    for on_submit in request.on_submit.drain(..) {
        on_submit();
    }
}

fn to_parts(entries: &[BatchEntry]) -> Result<Vec<BatchPart>> {
    entries
        .iter()
        .map(|entry| match entry {
            BatchEntry::Single(request) => Ok(BatchPart::Request(to_part(request)?)),
            BatchEntry::ChangeSet(requests) => Ok(BatchPart::ChangeSet(
                requests.iter().map(to_part).collect::<Result<Vec<_>>>()?,
            )),
        })
        .collect()
}

fn to_part(request: &QueuedRequest) -> Result<BatchRequestPart> {
    Ok(BatchRequestPart {
        method: request.method,
        url: request.url.clone(),
        headers: request.headers.clone(),
        body: request.body.as_deref().map(serialize_payload).transpose()?,
    })
}
