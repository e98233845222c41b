//! Request and queue types

use crate::core::headers::{Headers, IF_MATCH};
use crate::core::transport::HttpMethod;
use crate::utils::error::{RequestorError, Result};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Lifecycle callback stored with a request
pub type Callback = Box<dyn FnOnce() + Send + 'static>;

pub(super) type Responder = oneshot::Sender<Result<Value>>;

/// Identity of a request issued by a requestor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub(super) u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A request as handed to [`Requestor::request`](super::Requestor::request)
pub struct ODataRequest {
    pub(super) method: HttpMethod,
    pub(super) resource_path: String,
    pub(super) headers: Headers,
    pub(super) body: Option<Arc<Value>>,
    pub(super) on_submit: Option<Callback>,
    pub(super) on_cancel: Option<Callback>,
    pub(super) meta_path: Option<String>,
    pub(super) original_resource_path: Option<String>,
    pub(super) at_front: bool,
}

impl ODataRequest {
    /// Request for a path relative to the service root
    pub fn new(method: HttpMethod, resource_path: impl Into<String>) -> Self {
        Self {
            method,
            resource_path: resource_path.into(),
            headers: Headers::new(),
            body: None,
            on_submit: None,
            on_cancel: None,
            meta_path: None,
            original_resource_path: None,
            at_front: false,
        }
    }

    pub fn get(resource_path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, resource_path)
    }

    pub fn post(resource_path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, resource_path)
    }

    pub fn patch(resource_path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, resource_path)
    }

    pub fn delete(resource_path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, resource_path)
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn headers(mut self, headers: &Headers) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Request payload. Keep a clone of the `Arc` to address the request later by
    /// body identity (`remove_post`, `relocate`).
    pub fn body(mut self, body: impl Into<Arc<Value>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Called when the request is handed to the network
    pub fn on_submit(mut self, on_submit: impl FnOnce() + Send + 'static) -> Self {
        self.on_submit = Some(Box::new(on_submit));
        self
    }

    /// Called when the request is canceled before it was sent
    pub fn on_cancel(mut self, on_cancel: impl FnOnce() + Send + 'static) -> Self {
        self.on_cancel = Some(Box::new(on_cancel));
        self
    }

    pub fn meta_path(mut self, meta_path: impl Into<String>) -> Self {
        self.meta_path = Some(meta_path.into());
        self
    }

    /// Path reported in errors and messages instead of the request path
    pub fn original_resource_path(mut self, path: impl Into<String>) -> Self {
        self.original_resource_path = Some(path.into());
        self
    }

    /// Queue the request before the ones already waiting
    pub fn at_front(mut self, at_front: bool) -> Self {
        self.at_front = at_front;
        self
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn resource_path(&self) -> &str {
        &self.resource_path
    }
}

impl fmt::Debug for ODataRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ODataRequest")
            .field("method", &self.method)
            .field("resource_path", &self.resource_path)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("meta_path", &self.meta_path)
            .field("original_resource_path", &self.original_resource_path)
            .field("at_front", &self.at_front)
            .finish_non_exhaustive()
    }
}

/// Pending result of a request
///
/// Requests settle whether or not the handle is polled: queued requests when their
/// group's batch is processed, requests of a `Direct` group as soon as their response
/// arrives.
#[must_use = "the result of a request is only observable through its handle"]
pub struct RequestHandle {
    id: RequestId,
    inner: BoxFuture<'static, Result<Value>>,
}

impl RequestHandle {
    pub(super) fn queued(id: RequestId, receiver: oneshot::Receiver<Result<Value>>) -> Self {
        let inner = async move {
            match receiver.await {
                Ok(result) => result,
                Err(_) => Err(RequestorError::canceled(format!(
                    "Request {} was dropped without a response",
                    id
                ))),
            }
        }
        .boxed();

        Self { id, inner }
    }

    pub(super) fn ready(id: RequestId, result: Result<Value>) -> Self {
        Self {
            id,
            inner: futures::future::ready(result).boxed(),
        }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }
}

impl Future for RequestHandle {
    type Output = Result<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

impl fmt::Debug for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandle").field("id", &self.id).finish()
    }
}

/// A request waiting in a group queue
pub struct QueuedRequest {
    pub(super) id: RequestId,
    pub(super) method: HttpMethod,
    pub(super) url: String,
    pub(super) headers: Headers,
    pub(super) body: Option<Arc<Value>>,
    pub(super) resource_path: String,
    pub(super) meta_path: Option<String>,
    pub(super) on_submit: Vec<Callback>,
    pub(super) on_cancel: Option<Callback>,
    pub(super) responders: Vec<Responder>,
}

impl QueuedRequest {
    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// Path relative to the service root, as sent inside the batch
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> Option<&Arc<Value>> {
        self.body.as_ref()
    }

    /// Path used for error and message reporting
    pub fn resource_path(&self) -> &str {
        &self.resource_path
    }

    pub fn meta_path(&self) -> Option<&str> {
        self.meta_path.as_deref()
    }

    /// True if the request body is the given instance
    pub fn has_body(&self, body: &Arc<Value>) -> bool {
        self.body.as_ref().is_some_and(|own| Arc::ptr_eq(own, body))
    }

    /// True if the request targets the entity with the given `If-Match` value
    pub fn matches_entity(&self, entity: &str) -> bool {
        self.headers.get(IF_MATCH) == Some(entity)
    }

    pub(super) fn resolve(self, value: Value) {
        for responder in self.responders {
            let _ = responder.send(Ok(value.clone()));
        }
    }

    pub(super) fn reject(self, error: RequestorError) {
        for responder in self.responders {
            let _ = responder.send(Err(error.clone()));
        }
    }
}

impl fmt::Debug for QueuedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedRequest")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("resource_path", &self.resource_path)
            .finish_non_exhaustive()
    }
}

/// Non-GET requests that are submitted atomically
#[derive(Debug)]
pub(super) struct ChangeSet {
    pub(super) serial_number: u64,
    pub(super) requests: Vec<QueuedRequest>,
}

impl ChangeSet {
    pub(super) fn new(serial_number: u64) -> Self {
        Self {
            serial_number,
            requests: Vec::new(),
        }
    }
}

/// Queue of one group: change sets first, then the reads
///
/// Change set 0 always exists. New non-GET requests join the open change set, or an
/// earlier one if their group lock's serial number predates it.
#[derive(Debug)]
pub(super) struct BatchQueue {
    pub(super) change_sets: Vec<ChangeSet>,
    pub(super) reads: Vec<QueuedRequest>,
    pub(super) open_change_set: usize,
}

impl BatchQueue {
    pub(super) fn new() -> Self {
        Self {
            change_sets: vec![ChangeSet::new(0)],
            reads: Vec::new(),
            open_change_set: 0,
        }
    }

    pub(super) fn has_changes(&self) -> bool {
        self.change_sets
            .iter()
            .any(|change_set| !change_set.requests.is_empty())
    }

    pub(super) fn changes(&self) -> impl Iterator<Item = &QueuedRequest> {
        self.change_sets
            .iter()
            .flat_map(|change_set| change_set.requests.iter())
    }

    /// Index of the change set a non-GET request with the given lock serial joins
    pub(super) fn change_set_for(&self, serial_number: Option<u64>) -> usize {
        let serial_number = serial_number.unwrap_or(u64::MAX);
        let mut index = self.open_change_set;
        while index > 0 && self.change_sets[index].serial_number > serial_number {
            index -= 1;
        }
        index
    }
}

/// Top-level element of a cleaned-up queue, ready to be serialized
#[derive(Debug)]
pub(super) enum BatchEntry {
    Single(QueuedRequest),
    ChangeSet(Vec<QueuedRequest>),
}

/// A batch that has been sent and not yet answered
#[derive(Debug, Clone)]
pub(super) struct RunningBatch {
    pub(super) id: u64,
    pub(super) group_id: String,
    /// `If-Match` values of the modifying requests it carries
    pub(super) entities: Vec<Option<String>>,
    pub(super) request_ids: Vec<RequestId>,
}

/// Successful response of the send pipeline
#[derive(Debug, Clone)]
pub(super) struct SendResponse {
    pub(super) body: Option<String>,
    pub(super) content_type: Option<String>,
    pub(super) headers: Headers,
    pub(super) resource_path: String,
}
