//! Transport backed by a `reqwest` client

use super::HttpTransport;
use super::types::{HttpRequest, HttpResponse};
use crate::config::RequestorConfig;
use crate::core::headers::Headers;
use crate::utils::error::{RequestorError, Result};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, Method};
use std::time::Duration;
use tracing::debug;

/// [`HttpTransport`] implementation on top of `reqwest`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Creates a transport honoring the configured timeout and user agent
    pub fn new(config: &RequestorConfig) -> Result<Self> {
        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| format!("odata-requestor/{}", env!("CARGO_PKG_VERSION")));

        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(user_agent)
            .build()
            .map_err(|e| RequestorError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Wraps an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let method = Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| RequestorError::invalid_request(e.to_string()))?;

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            RequestorError::network(format!("{} {} failed: {}", request.method, request.url, e))
        })?;

        let status = response.status();
        let mut headers = Headers::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers.insert(name.as_str(), value);
            }
        }

        let text = response.text().await.map_err(|e| {
            RequestorError::network(format!(
                "Failed to read response body of {} {}: {}",
                request.method, request.url, e
            ))
        })?;

        debug!(
            "{} {} -> {}",
            request.method,
            request.url,
            status.as_u16()
        );

        Ok(HttpResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body: (!text.is_empty()).then_some(text),
        })
    }
}
