//! Response and payload fixtures

use odata_requestor::HttpResponse;
use serde_json::Value;

pub const SERVICE_URL: &str = "https://host.example/sap/opu/odata4/svc/";
pub const BATCH_BOUNDARY: &str = "batchresponse_1";

/// JSON response carrying the V4 version header
pub fn json_response(status: u16, body: Value) -> HttpResponse {
    HttpResponse::new(status)
        .with_json(&body)
        .with_header("OData-Version", "4.0")
}

/// One part of a batch response, rendered as an embedded HTTP response
pub struct PartResponse {
    status: u16,
    reason: &'static str,
    headers: Vec<(String, String)>,
    body: Option<String>,
}

impl PartResponse {
    pub fn json(status: u16, reason: &'static str, body: Value) -> Self {
        Self {
            status,
            reason,
            headers: vec![(
                "Content-Type".to_string(),
                "application/json;odata.metadata=minimal".to_string(),
            )],
            body: Some(body.to_string()),
        }
    }

    pub fn no_content() -> Self {
        Self {
            status: 204,
            reason: "No Content",
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    fn render(&self, out: &mut String) {
        out.push_str("Content-Type: application/http\r\n");
        out.push_str("Content-Transfer-Encoding: binary\r\n\r\n");
        out.push_str(&format!("HTTP/1.1 {} {}\r\n", self.status, self.reason));
        for (name, value) in &self.headers {
            out.push_str(&format!("{}: {}\r\n", name, value));
        }
        out.push_str("\r\n");
        if let Some(body) = &self.body {
            out.push_str(body);
        }
        out.push_str("\r\n");
    }
}

/// Top-level element of a batch response
pub enum ResponseItem {
    Single(PartResponse),
    ChangeSet(Vec<PartResponse>),
}

/// Renders a `multipart/mixed` batch response body for [`BATCH_BOUNDARY`]
pub fn batch_body(items: &[ResponseItem]) -> String {
    let mut out = String::new();
    for (index, item) in items.iter().enumerate() {
        out.push_str(&format!("--{}\r\n", BATCH_BOUNDARY));
        match item {
            ResponseItem::Single(part) => part.render(&mut out),
            ResponseItem::ChangeSet(parts) => {
                let change_set = format!("changesetresponse_{}", index);
                out.push_str(&format!(
                    "Content-Type: multipart/mixed; boundary={}\r\n\r\n",
                    change_set
                ));
                for part in parts {
                    out.push_str(&format!("--{}\r\n", change_set));
                    part.render(&mut out);
                }
                out.push_str(&format!("--{}--\r\n", change_set));
            }
        }
    }
    out.push_str(&format!("--{}--\r\n", BATCH_BOUNDARY));
    out
}

/// `$batch` response wrapping [`batch_body`]
pub fn batch_response(items: &[ResponseItem]) -> HttpResponse {
    HttpResponse::new(200)
        .with_header(
            "Content-Type",
            &format!("multipart/mixed; boundary={}", BATCH_BOUNDARY),
        )
        .with_header("OData-Version", "4.0")
        .with_body(batch_body(items))
}
