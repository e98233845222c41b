use crate::core::headers::{Headers, SAP_CONTEXT_ID, X_CSRF_TOKEN};

const REDACTED: &str = "***REDACTED***";

/// Masks secrets before they reach the log
pub struct Sanitization;

impl Sanitization {
    /// Copy of `headers` with the CSRF token and the session context id masked.
    ///
    /// The `Fetch` and `Required` token sentinels carry no secret and stay readable.
    pub fn redact_headers(headers: &Headers) -> Headers {
        headers
            .iter()
            .map(|(name, value)| {
                let secret = match name {
                    X_CSRF_TOKEN => {
                        !value.eq_ignore_ascii_case("fetch") && !value.eq_ignore_ascii_case("required")
                    }
                    SAP_CONTEXT_ID => true,
                    _ => false,
                };
                (name, if secret { REDACTED } else { value })
            })
            .collect()
    }

    /// Single-line rendering of redacted headers, `Name: value` separated by `; `
    pub fn describe_headers(headers: &Headers) -> String {
        Self::redact_headers(headers)
            .iter()
            .map(|(name, value)| format!("{}: {}", name, value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}
