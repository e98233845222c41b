//! `multipart/mixed` implementation of the batch codec

use super::BatchCodec;
use super::types::{BatchPart, BatchRequestPart, BatchResponsePart, ResponseEnvelope, SerializedBatch};
use crate::core::headers::{CONTENT_TYPE, Headers, MIME_VERSION};
use crate::utils::error::{RequestorError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

static BOUNDARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)boundary=(?:"([^"]+)"|([^;\s]+))"#).expect("boundary pattern is valid")
});

static STATUS_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^HTTP/\d\.\d\s+(\d{3})\s*(.*)$").expect("status line pattern is valid")
});

/// Batch codec producing and reading `multipart/mixed` payloads
#[derive(Debug, Clone, Default)]
pub struct MultipartBatchCodec;

impl MultipartBatchCodec {
    pub fn new() -> Self {
        Self
    }
}

impl BatchCodec for MultipartBatchCodec {
    fn serialize_batch_request(&self, parts: &[BatchPart]) -> Result<SerializedBatch> {
        let boundary = format!("batch_{}", Uuid::new_v4());
        let mut body = String::new();

        for (index, part) in parts.iter().enumerate() {
            body.push_str(&format!("--{}\r\n", boundary));
            match part {
                BatchPart::Request(request) => write_request(&mut body, request, None),
                BatchPart::ChangeSet(requests) => {
                    let change_set = format!("changeset_{}", Uuid::new_v4());
                    body.push_str(&format!(
                        "Content-Type: multipart/mixed; boundary={}\r\n\r\n",
                        change_set
                    ));
                    for (position, request) in requests.iter().enumerate() {
                        body.push_str(&format!("--{}\r\n", change_set));
                        write_request(&mut body, request, Some(format!("{}.{}", position, index)));
                    }
                    body.push_str(&format!("--{}--\r\n", change_set));
                }
            }
        }
        body.push_str(&format!("--{}--\r\n", boundary));

        Ok(SerializedBatch {
            body,
            headers: Headers::new()
                .with(
                    CONTENT_TYPE,
                    format!("multipart/mixed; boundary={}", boundary),
                )
                .with(MIME_VERSION, "1.0"),
        })
    }

    fn deserialize_batch_response(
        &self,
        content_type: &str,
        body: &str,
    ) -> Result<Vec<BatchResponsePart>> {
        let boundary = boundary_of(content_type)?;
        let mut responses = Vec::new();

        for part in split_parts(body, &boundary)? {
            let (headers, content) = split_headers(part);
            let part_type = headers.get(CONTENT_TYPE).unwrap_or_default();

            if part_type.to_ascii_lowercase().starts_with("multipart/mixed") {
                let change_set = boundary_of(part_type)?;
                let members = split_parts(content, &change_set)?
                    .into_iter()
                    .map(|member| parse_http_response(split_headers(member).1))
                    .collect::<Result<Vec<_>>>()?;
                responses.push(BatchResponsePart::ChangeSet(members));
            } else {
                responses.push(BatchResponsePart::Response(parse_http_response(content)?));
            }
        }

        Ok(responses)
    }
}

fn write_request(out: &mut String, request: &BatchRequestPart, content_id: Option<String>) {
    out.push_str("Content-Type: application/http\r\n");
    out.push_str("Content-Transfer-Encoding: binary\r\n");
    if let Some(id) = content_id {
        out.push_str(&format!("Content-ID: {}\r\n", id));
    }
    out.push_str("\r\n");

    out.push_str(&format!("{} {} HTTP/1.1\r\n", request.method, request.url));
    for (name, value) in request.headers.iter() {
        out.push_str(&format!("{}: {}\r\n", name, value));
    }
    out.push_str("\r\n");
    if let Some(body) = &request.body {
        out.push_str(body);
    }
    out.push_str("\r\n");
}

fn boundary_of(content_type: &str) -> Result<String> {
    BOUNDARY
        .captures(content_type)
        .and_then(|captures| captures.get(1).or_else(|| captures.get(2)))
        .map(|boundary| boundary.as_str().to_string())
        .ok_or_else(|| {
            RequestorError::batch_format(format!(
                "Invalid $batch response header 'Content-Type': {}",
                content_type
            ))
        })
}

/// Splits a multipart body into its parts. Lines may end with `\r\n` or `\n`.
fn split_parts<'a>(body: &'a str, boundary: &str) -> Result<Vec<&'a str>> {
    let delimiter = format!("--{}", boundary);
    let mut segments = body.split(delimiter.as_str());
    // preamble
    segments.next();

    let mut parts = Vec::new();
    for segment in segments {
        if segment.starts_with("--") {
            return Ok(parts);
        }
        let segment = strip_line_break_prefix(segment.trim_start_matches([' ', '\t']));
        // the line break before a delimiter belongs to the delimiter
        parts.push(strip_line_break_suffix(segment));
    }

    Err(RequestorError::batch_format(format!(
        "Missing closing delimiter for boundary '{}'",
        boundary
    )))
}

fn strip_line_break_prefix(text: &str) -> &str {
    text.strip_prefix("\r\n")
        .or_else(|| text.strip_prefix('\n'))
        .unwrap_or(text)
}

fn strip_line_break_suffix(text: &str) -> &str {
    text.strip_suffix("\r\n")
        .or_else(|| text.strip_suffix('\n'))
        .unwrap_or(text)
}

/// Splits at the first empty line into head and rest
fn split_at_blank_line(text: &str) -> Option<(&str, &str)> {
    let crlf = text.find("\r\n\r\n").map(|position| (position, 4));
    let lf = text.find("\n\n").map(|position| (position, 2));
    let (position, length) = match (crlf, lf) {
        (Some(crlf), Some(lf)) => {
            if crlf.0 <= lf.0 {
                crlf
            } else {
                lf
            }
        }
        (crlf, lf) => crlf.or(lf)?,
    };
    Some((&text[..position], &text[position + length..]))
}

fn split_headers(part: &str) -> (Headers, &str) {
    let rest = strip_line_break_prefix(part);
    if rest.len() != part.len() {
        return (Headers::new(), rest);
    }
    match split_at_blank_line(part) {
        Some((head, rest)) => (parse_header_lines(head), rest),
        None => (parse_header_lines(part), ""),
    }
}

fn parse_header_lines(block: &str) -> Headers {
    block
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .collect()
}

fn parse_http_response(text: &str) -> Result<ResponseEnvelope> {
    let text = text.trim_start_matches(['\r', '\n']);
    let (head, body) = split_at_blank_line(text)
        .unwrap_or_else(|| (text.trim_end_matches(['\r', '\n']), ""));

    let mut lines = head.lines();
    let status_line = lines.next().unwrap_or_default().trim();
    let captures = STATUS_LINE.captures(status_line).ok_or_else(|| {
        RequestorError::batch_format(format!("Invalid status line '{}'", status_line))
    })?;
    let status = captures[1].parse::<u16>().map_err(|e| {
        RequestorError::batch_format(format!("Invalid status code in '{}': {}", status_line, e))
    })?;
    let status_text = captures
        .get(2)
        .map_or("", |text| text.as_str())
        .trim()
        .to_string();

    let headers = parse_header_lines(&lines.collect::<Vec<_>>().join("\n"));
    let body = body.trim_end_matches(['\r', '\n']);

    Ok(ResponseEnvelope {
        status,
        status_text,
        headers,
        body: (!body.trim().is_empty()).then(|| body.to_string()),
    })
}
