//! Send pipeline: CSRF token handling, version check and message reporting

use super::requestor::{FETCH_TOKEN, Requestor, TokenRefresh};
use super::types::SendResponse;
use crate::config::ODataVersion;
use crate::core::headers::{
    CONTENT_TYPE, DATA_SERVICE_VERSION, Headers, ODATA_VERSION, SAP_CONTEXT_ID, SAP_ERR_ID,
    SAP_HTTP_SESSION_TIMEOUT, X_CSRF_TOKEN,
};
use crate::core::transport::{HttpMethod, HttpRequest};
use crate::utils::error::{CommunicationError, RequestorError, Result};
use crate::utils::logging::Sanitization;
use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, error};

/// Session not found on the server
pub(super) const NO_SESSION: &str = "ICMENOSESSION";

impl Requestor {
    /// Sends one HTTP request relative to the service root.
    ///
    /// Modifying requests wait for a pending token refresh first. A `403` asking for a
    /// CSRF token refreshes the token and retries the request once.
    pub(super) async fn send_request(
        &self,
        method: HttpMethod,
        resource_path: &str,
        headers: Headers,
        body: Option<String>,
        original_resource_path: &str,
    ) -> Result<SendResponse> {
        if !method.is_get() {
            let pending = {
                let state = self.inner.state.lock();
                state.token_refresh.clone()
            };
            if let Some(refresh) = pending {
                refresh.await?;
            }
        }

        let url = format!("{}{}", self.inner.config.service_url, resource_path);
        let mut fresh_token = false;

        loop {
            let (request_headers, old_token) = {
                let state = self.inner.state.lock();
                (
                    Headers::merged(&[&self.inner.predefined.request, &state.headers, &headers]),
                    state.headers.get(X_CSRF_TOKEN).map(str::to_string),
                )
            };

            let request = HttpRequest {
                method,
                url: url.clone(),
                headers: request_headers,
                body: body.clone(),
            };
            debug!(
                "Sending {} {} [{}]",
                method,
                url,
                Sanitization::describe_headers(&request.headers)
            );
            let response = self.inner.transport.send(request).await.map_err(|e| {
                RequestorError::from(CommunicationError::transport(
                    e.to_string(),
                    Some(&url),
                    Some(original_resource_path),
                ))
            })?;
            debug!("{} {} -> {}", method, url, response.status);

            if response.is_success() {
                self.check_version_header(&response.headers, &url, response.text().is_none())?;
                {
                    let mut state = self.inner.state.lock();
                    if let Some(token) = response.header(X_CSRF_TOKEN) {
                        state.headers.insert(X_CSRF_TOKEN, token);
                    }
                }
                self.set_session_context(
                    response.header(SAP_CONTEXT_ID),
                    response.header(SAP_HTTP_SESSION_TIMEOUT),
                );

                return Ok(SendResponse {
                    content_type: response.header(CONTENT_TYPE).map(str::to_string),
                    body: response.body,
                    headers: response.headers,
                    resource_path: original_resource_path.to_string(),
                });
            }

            let token_required = response
                .header(X_CSRF_TOKEN)
                .is_some_and(|token| token.eq_ignore_ascii_case("required"));
            if response.status == 403 && token_required && !fresh_token {
                debug!("CSRF token required for {} {}", method, url);
                self.refresh_security_token(old_token).await?;
                fresh_token = true;
                continue;
            }

            if response.header(SAP_ERR_ID) == Some(NO_SESSION) {
                error!("Session not found on server");
                self.clear_session_context_with(true);
            }

            return Err(CommunicationError::from_response(
                response.status,
                &response.status_text,
                &response.headers,
                response.body.as_deref(),
                "Communication error",
                Some(&url),
                Some(original_resource_path),
            )
            .into());
        }
    }

    /// Fetches a new CSRF token unless `old_token` is already outdated.
    ///
    /// Concurrent callers share one in-flight fetch.
    pub fn refresh_security_token(&self, old_token: Option<String>) -> TokenRefresh {
        let mut state = self.inner.state.lock();
        if let Some(pending) = &state.token_refresh {
            return pending.clone();
        }
        if state.headers.get(X_CSRF_TOKEN) != old_token.as_deref() {
            return futures::future::ready(Ok(())).boxed().shared();
        }

        let this = self.clone();
        let refresh = async move {
            let result = this.fetch_security_token().await;
            this.inner.state.lock().token_refresh = None;
            result
        }
        .boxed()
        .shared();

        state.token_refresh = Some(refresh.clone());
        refresh
    }

    async fn fetch_security_token(&self) -> Result<()> {
        let url = format!(
            "{}{}",
            self.inner.config.service_url, self.inner.query_string
        );
        let headers = {
            let state = self.inner.state.lock();
            Headers::merged(&[&state.headers]).with(X_CSRF_TOKEN, FETCH_TOKEN)
        };

        debug!("Fetching CSRF token from {}", url);
        let response = self
            .inner
            .transport
            .send(HttpRequest {
                method: HttpMethod::Head,
                url: url.clone(),
                headers,
                body: None,
            })
            .await
            .map_err(|e| {
                RequestorError::from(CommunicationError::transport(
                    format!("Could not refresh security token: {}", e),
                    Some(&url),
                    None,
                ))
            })?;

        if !response.is_success() {
            return Err(CommunicationError::from_response(
                response.status,
                &response.status_text,
                &response.headers,
                response.body.as_deref(),
                "Could not refresh security token",
                Some(&url),
                None,
            )
            .into());
        }

        let mut state = self.inner.state.lock();
        match response.header(X_CSRF_TOKEN) {
            Some(token) => {
                state.headers.insert(X_CSRF_TOKEN, token);
            }
            None => {
                state.headers.remove(X_CSRF_TOKEN);
            }
        }
        Ok(())
    }

    /// Checks the protocol version header of a response.
    ///
    /// With `optional`, a missing header is accepted. The header of the other
    /// protocol version is always an error.
    pub(super) fn check_version_header(
        &self,
        headers: &Headers,
        url: &str,
        optional: bool,
    ) -> Result<()> {
        let version = self.inner.config.odata_version;
        let header = version.version_header();
        let other_header = match version {
            ODataVersion::V4 => DATA_SERVICE_VERSION,
            ODataVersion::V2 => ODATA_VERSION,
        };

        let received = headers.get(header);
        let mismatch = |received: String| RequestorError::VersionMismatch {
            header,
            expected: version.as_str(),
            received,
            url: url.to_string(),
        };

        match received {
            None => match headers.get(other_header) {
                Some(other) => Err(mismatch(format!(
                    "'{}' header with value '{}'",
                    other_header, other
                ))),
                None if optional => Ok(()),
                None => Err(mismatch("no value".to_string())),
            },
            Some(value) if value == version.as_str() => Ok(()),
            Some("1.0") if version == ODataVersion::V2 => Ok(()),
            Some(value) => Err(mismatch(format!("value '{}'", value))),
        }
    }

    /// Reports the `sap-messages` header of a response to the model.
    ///
    /// Messages with a `target` are bound, all others unbound.
    pub(super) fn report_header_messages(
        &self,
        resource_path: &str,
        header: Option<&str>,
    ) -> Result<()> {
        let Some(header) = header else {
            return Ok(());
        };

        let messages = match serde_json::from_str::<Value>(header)? {
            Value::Array(messages) => messages,
            Value::Null => Vec::new(),
            message => vec![message],
        };
        let (bound, unbound): (Vec<Value>, Vec<Value>) = messages
            .into_iter()
            .partition(|message| message.get("target").is_some_and(|target| !target.is_null()));

        if !unbound.is_empty() {
            self.inner
                .model
                .report_unbound_messages(resource_path, &unbound);
        }
        if !bound.is_empty() {
            self.inner.model.report_bound_messages(resource_path, &bound);
        }
        Ok(())
    }
}
