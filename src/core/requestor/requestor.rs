//! Requestor handle, shared state and request admission

use super::session::SessionState;
use super::types::{BatchQueue, ODataRequest, QueuedRequest, RequestHandle, RequestId, RunningBatch};
use crate::config::{ODataVersion, RequestorConfig};
use crate::core::batch::{BatchCodec, MultipartBatchCodec};
use crate::core::group_lock::GroupLock;
use crate::core::headers::{
    ACCEPT, CONTENT_TYPE, DATA_SERVICE_VERSION, ETAG, Headers, MAX_DATA_SERVICE_VERSION,
    ODATA_MAX_VERSION, ODATA_VERSION, SAP_CONTEXT_ID, SAP_MESSAGES, X_CSRF_TOKEN,
};
use crate::core::model::{ModelInterface, SubmitMode};
use crate::core::transport::{HttpMethod, HttpTransport, ReqwestTransport};
use crate::utils::error::{RequestorError, Result};
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::debug;

/// Token value asking the server to hand out a CSRF token
pub const FETCH_TOKEN: &str = "Fetch";

const V4_ACCEPT: &str = "application/json;odata.metadata=minimal;IEEE754Compatible=true";
const V4_CONTENT_TYPE: &str = "application/json;charset=UTF-8;IEEE754Compatible=true";
const V2_ACCEPT: &str = "application/json";
const V2_CONTENT_TYPE: &str = "application/json;charset=UTF-8";

/// Shared, in-flight CSRF token fetch
pub type TokenRefresh = Shared<BoxFuture<'static, Result<()>>>;

/// Orchestrates the requests against one OData service
///
/// A requestor owns the per-group queues, the CSRF token and the session context of one
/// service connection. It is a cheap handle; clones share the same state.
#[derive(Clone)]
pub struct Requestor {
    pub(super) inner: Arc<RequestorInner>,
}

pub(super) struct RequestorInner {
    pub(super) config: RequestorConfig,
    /// `?`-prefixed encoding of the configured query parameters, or empty
    pub(super) query_string: String,
    pub(super) transport: Arc<dyn HttpTransport>,
    pub(super) codec: Arc<dyn BatchCodec>,
    pub(super) model: Arc<dyn ModelInterface>,
    pub(super) predefined: PredefinedHeaders,
    pub(super) state: Mutex<RequestorState>,
}

/// Headers the requestor adds on its own, by OData version
pub(super) struct PredefinedHeaders {
    /// Sent with every top-level HTTP request
    pub(super) request: Headers,
    /// Sent with every request inside a batch
    pub(super) part: Headers,
    /// Added after the caller's headers
    pub(super) final_headers: Headers,
}

impl PredefinedHeaders {
    fn for_version(version: ODataVersion) -> Self {
        match version {
            ODataVersion::V4 => Self {
                request: Headers::new()
                    .with(ACCEPT, V4_ACCEPT)
                    .with(ODATA_MAX_VERSION, "4.0")
                    .with(ODATA_VERSION, "4.0")
                    .with(X_CSRF_TOKEN, FETCH_TOKEN),
                part: Headers::new().with(ACCEPT, V4_ACCEPT),
                final_headers: Headers::new().with(CONTENT_TYPE, V4_CONTENT_TYPE),
            },
            ODataVersion::V2 => Self {
                request: Headers::new()
                    .with(ACCEPT, V2_ACCEPT)
                    .with(MAX_DATA_SERVICE_VERSION, "2.0")
                    .with(DATA_SERVICE_VERSION, "2.0")
                    .with(X_CSRF_TOKEN, FETCH_TOKEN),
                part: Headers::new().with(ACCEPT, V2_ACCEPT),
                final_headers: Headers::new().with(CONTENT_TYPE, V2_CONTENT_TYPE),
            },
        }
    }
}

pub(super) struct RequestorState {
    pub(super) queues: HashMap<String, BatchQueue>,
    pub(super) running: Vec<RunningBatch>,
    /// Custom headers plus the received CSRF token and session context id
    pub(super) headers: Headers,
    pub(super) token_refresh: Option<TokenRefresh>,
    pub(super) session: SessionState,
    pub(super) locked_group_locks: Vec<GroupLock>,
    pub(super) next_serial_number: u64,
    pub(super) next_request_id: u64,
    pub(super) next_batch_id: u64,
}

impl RequestorState {
    pub(super) fn request_id(&mut self) -> RequestId {
        self.next_request_id += 1;
        RequestId(self.next_request_id)
    }

    pub(super) fn serial_number(&mut self) -> u64 {
        self.next_serial_number += 1;
        self.next_serial_number
    }

    /// Queue of the group, created on first use; the flag tells whether it is new
    pub(super) fn queue(&mut self, group_id: &str) -> (&mut BatchQueue, bool) {
        let created = !self.queues.contains_key(group_id);
        let queue = self
            .queues
            .entry(group_id.to_string())
            .or_insert_with(BatchQueue::new);
        (queue, created)
    }

    pub(super) fn is_running(&self, group_id: &str) -> bool {
        self.running.iter().any(|batch| batch.group_id == group_id)
    }
}

impl Drop for RequestorInner {
    fn drop(&mut self) {
        if let Some(timer) = self.state.get_mut().session.timer.take() {
            timer.abort();
        }
    }
}

impl Requestor {
    /// Creates a requestor with explicit collaborators
    pub fn new(
        config: RequestorConfig,
        transport: Arc<dyn HttpTransport>,
        codec: Arc<dyn BatchCodec>,
        model: Arc<dyn ModelInterface>,
    ) -> Result<Self> {
        config.check()?;

        let query_string = Self::build_query_string(
            config
                .query_params
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str())),
        );
        let predefined = PredefinedHeaders::for_version(config.odata_version);
        let state = RequestorState {
            queues: HashMap::new(),
            running: Vec::new(),
            headers: config.headers.clone(),
            token_refresh: None,
            session: SessionState::default(),
            locked_group_locks: Vec::new(),
            next_serial_number: 0,
            next_request_id: 0,
            next_batch_id: 0,
        };

        debug!(
            "Created requestor for {} (OData {})",
            config.service_url, config.odata_version
        );

        Ok(Self {
            inner: Arc::new(RequestorInner {
                config,
                query_string,
                transport,
                codec,
                model,
                predefined,
                state: Mutex::new(state),
            }),
        })
    }

    /// Creates a requestor talking HTTP through `reqwest` with `multipart/mixed` batches
    pub fn connect(config: RequestorConfig, model: Arc<dyn ModelInterface>) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::new(&config)?);
        Self::new(config, transport, Arc::new(MultipartBatchCodec::new()), model)
    }

    pub fn service_url(&self) -> &str {
        &self.inner.config.service_url
    }

    pub fn config(&self) -> &RequestorConfig {
        &self.inner.config
    }

    pub fn odata_version(&self) -> ODataVersion {
        self.inner.config.odata_version
    }

    /// Current CSRF token, `Fetch` until the server handed one out
    pub fn security_token(&self) -> String {
        let state = self.inner.state.lock();
        state
            .headers
            .get(X_CSRF_TOKEN)
            .unwrap_or(FETCH_TOKEN)
            .to_string()
    }

    pub fn session_context_id(&self) -> Option<String> {
        let state = self.inner.state.lock();
        state.headers.get(SAP_CONTEXT_ID).map(str::to_string)
    }

    pub fn group_submit_mode(&self, group_id: &str) -> SubmitMode {
        self.inner.model.group_submit_mode(group_id)
    }

    /// Whether a change set with a single request is sent without its wrapper
    pub fn is_change_set_optional(&self) -> bool {
        self.inner.config.is_change_set_optional()
    }

    /// Delegates to the model
    pub async fn fetch_metadata(&self, path: &str) -> Result<Value> {
        self.inner.model.fetch_metadata(path).await
    }

    /// Next serial number, starting at 1
    pub fn get_serial_number(&self) -> u64 {
        self.inner.state.lock().serial_number()
    }

    /// Issues a group lock with a fresh serial number. Locked locks block
    /// `submit_batch` for their group until they are released.
    pub fn lock_group(
        &self,
        group_id: &str,
        owner: Option<&str>,
        locked: bool,
        modifying: bool,
    ) -> GroupLock {
        let mut state = self.inner.state.lock();
        let mut builder = GroupLock::builder()
            .group_id(group_id)
            .locked(locked)
            .modifying(modifying)
            .serial_number(state.serial_number());
        if let Some(owner) = owner {
            builder = builder.owner(owner);
        }
        let lock = builder.build();

        if locked {
            state.locked_group_locks.retain(GroupLock::is_locked);
            state.locked_group_locks.push(lock.clone());
        }
        lock
    }

    /// Cancels every locked, modifying lock of the group, or of all groups
    pub fn cancel_group_locks(&self, group_id: Option<&str>) {
        let locks = {
            let mut state = self.inner.state.lock();
            state.locked_group_locks.retain(GroupLock::is_locked);
            state.locked_group_locks.clone()
        };

        for lock in locks {
            let in_scope = group_id.is_none() || lock.group_id().as_deref() == group_id;
            if in_scope && lock.is_modifying() && lock.is_locked() {
                lock.cancel();
            }
        }
    }

    /// Opens a new change set for the group; later non-GET requests join it
    pub fn add_change_set(&self, group_id: &str) {
        let created = {
            let mut state = self.inner.state.lock();
            let serial_number = state.serial_number();
            let (queue, created) = state.queue(group_id);
            queue.open_change_set += 1;
            queue.change_sets.insert(
                queue.open_change_set,
                super::types::ChangeSet::new(serial_number),
            );
            created
        };

        if created {
            self.inner.model.on_create_group(group_id);
        }
    }

    /// Sends a request or queues it for its group.
    ///
    /// Without a lock the request goes to `$direct`. A request for `$cached` fails
    /// immediately; a request whose lock was canceled resolves to a canceled error.
    pub fn request(
        &self,
        request: ODataRequest,
        group_lock: Option<&GroupLock>,
    ) -> Result<RequestHandle> {
        let group_id = group_lock
            .and_then(GroupLock::group_id)
            .unwrap_or_else(|| "$direct".to_string());

        if group_id == "$cached" {
            return Err(RequestorError::cached(
                request.method,
                request.resource_path,
            ));
        }

        let id = {
            let mut state = self.inner.state.lock();
            state.request_id()
        };

        if let Some(lock) = group_lock.filter(|lock| lock.is_canceled()) {
            if let Some(on_cancel) = request.on_cancel {
                on_cancel();
            }
            lock.unlock(false);
            return Ok(RequestHandle::ready(
                id,
                Err(RequestorError::canceled("Request already canceled")),
            ));
        }

        let handle = if self.group_submit_mode(&group_id) == SubmitMode::Direct {
            self.send_direct(id, request)
        } else {
            let serial_number = group_lock.and_then(GroupLock::serial_number);
            self.enqueue(id, &group_id, serial_number, request)
        };

        // a submit waiting for this lock must find the request already queued or sent
        if let Some(lock) = group_lock {
            lock.unlock(false);
        }
        Ok(handle)
    }

    /// Starts the send pipeline for a request of a `Direct` group right away
    fn send_direct(&self, id: RequestId, request: ODataRequest) -> RequestHandle {
        let Ok(runtime) = Handle::try_current() else {
            return RequestHandle::ready(
                id,
                Err(RequestorError::invalid_request(format!(
                    "Cannot send {} {} without an async runtime",
                    request.method, request.resource_path
                ))),
            );
        };

        let ODataRequest {
            method,
            resource_path,
            headers,
            body,
            on_submit,
            original_resource_path,
            ..
        } = request;

        if let Some(on_submit) = on_submit {
            on_submit();
        }

        let headers = Headers::merged(&[&headers, &self.inner.predefined.final_headers]);
        let original_resource_path = original_resource_path.unwrap_or_else(|| resource_path.clone());
        let this = self.clone();
        let (sender, receiver) = oneshot::channel();
        debug!("Sending {} {} {} directly", id, method, resource_path);

        runtime.spawn(async move {
            let result = async {
                let payload = body.as_deref().map(serialize_payload).transpose()?;
                let response = this
                    .send_request(
                        method,
                        &resource_path,
                        headers,
                        payload,
                        &original_resource_path,
                    )
                    .await?;
                this.report_header_messages(
                    &response.resource_path,
                    response.headers.get(SAP_MESSAGES),
                )?;
                let value = parse_response_body(method, response.body.as_deref())?;
                Ok::<_, RequestorError>(with_etag(value, response.headers.get(ETAG)))
            }
            .await;
            // the caller may have dropped the handle
            let _ = sender.send(result);
        });

        RequestHandle::queued(id, receiver)
    }

    fn enqueue(
        &self,
        id: RequestId,
        group_id: &str,
        serial_number: Option<u64>,
        request: ODataRequest,
    ) -> RequestHandle {
        let (sender, receiver) = oneshot::channel();
        let headers = Headers::merged(&[
            &self.inner.predefined.part,
            &self.inner.config.headers,
            &request.headers,
            &self.inner.predefined.final_headers,
        ]);
        let queued = QueuedRequest {
            id,
            method: request.method,
            resource_path: request
                .original_resource_path
                .unwrap_or_else(|| request.resource_path.clone()),
            url: request.resource_path,
            headers,
            body: request.body,
            meta_path: request.meta_path,
            on_submit: request.on_submit.into_iter().collect(),
            on_cancel: request.on_cancel,
            responders: vec![sender],
        };

        let created = {
            let mut state = self.inner.state.lock();
            let (queue, created) = state.queue(group_id);
            debug!(
                "Queued {} {} {} for group '{}'",
                id, queued.method, queued.url, group_id
            );

            if queued.method.is_get() {
                if request.at_front {
                    queue.reads.insert(0, queued);
                } else {
                    queue.reads.push(queued);
                }
            } else if request.at_front {
                queue.change_sets[0].requests.insert(0, queued);
            } else {
                let index = queue.change_set_for(serial_number);
                queue.change_sets[index].requests.push(queued);
            }
            created
        };

        if created {
            self.inner.model.on_create_group(group_id);
        }

        RequestHandle::queued(id, receiver)
    }

    /// Encodes query options as `?name=value&...`, or an empty string without options.
    ///
    /// Characters OData uses in system query options (`$`, `(`, `)`, `'`, `,`, `:`, `/`)
    /// stay readable; `&`, `#`, `+` and `=` in names are escaped.
    pub fn build_query_string<I, K, V>(options: I) -> String
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let pairs: Vec<String> = options
            .into_iter()
            .map(|(name, value)| {
                format!(
                    "{}={}",
                    encode_query_part(name.as_ref(), true),
                    encode_query_part(value.as_ref(), false)
                )
            })
            .collect();

        if pairs.is_empty() {
            String::new()
        } else {
            format!("?{}", pairs.join("&"))
        }
    }
}

fn encode_query_part(part: &str, encode_equals: bool) -> String {
    let mut encoded = String::with_capacity(part.len());
    for byte in part.bytes() {
        let keep = byte.is_ascii_alphanumeric()
            || b"-_.!~*'();,/?:@$".contains(&byte)
            || (byte == b'=' && !encode_equals);
        if keep {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}

/// Removes client-only annotations (keys starting with `@$`) at any depth
pub fn clean_payload(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !key.starts_with("@$"))
                .map(|(key, value)| (key.clone(), clean_payload(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(clean_payload).collect()),
        other => other.clone(),
    }
}

pub(super) fn serialize_payload(body: &Value) -> Result<String> {
    Ok(serde_json::to_string(&clean_payload(body))?)
}

/// Converts a response body; an empty body is `null` for reads and `{}` otherwise
pub(super) fn parse_response_body(method: HttpMethod, body: Option<&str>) -> Result<Value> {
    match body.map(str::trim).filter(|text| !text.is_empty()) {
        Some(text) => Ok(serde_json::from_str(text)?),
        None if method.is_get() => Ok(Value::Null),
        None => Ok(Value::Object(Default::default())),
    }
}

/// Copies a response `ETag` into an object body as `@odata.etag`
pub(super) fn with_etag(mut value: Value, etag: Option<&str>) -> Value {
    if let (Some(etag), Value::Object(object)) = (etag, &mut value) {
        object.insert("@odata.etag".to_string(), Value::String(etag.to_string()));
    }
    value
}
