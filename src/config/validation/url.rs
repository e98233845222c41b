//! Service URL validation

use url::Url;

/// Checks that `url_str` is an absolute http(s) URL usable as a service root
pub fn validate_service_url(url_str: &str) -> Result<(), String> {
    if url_str.is_empty() {
        return Err("Service URL cannot be empty".to_string());
    }

    let url = Url::parse(url_str).map_err(|e| format!("Invalid service URL '{}': {}", url_str, e))?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(format!(
                "Service URL must use http:// or https:// scheme, got: {}",
                scheme
            ));
        }
    }

    if url.host_str().is_none() {
        return Err("Service URL must have a host".to_string());
    }

    if url.query().is_some() {
        return Err("Service URL must not contain a query, use query_params".to_string());
    }

    if !url_str.ends_with('/') {
        return Err(format!("Service URL must end with '/': {}", url_str));
    }

    Ok(())
}
