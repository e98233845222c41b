//! Case-insensitive HTTP header map
//!
//! Header names are normalized to a canonical spelling on insertion, so lookups and
//! comparisons never depend on the casing a server or caller happened to use.


use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub const ACCEPT: &str = "Accept";
pub const CONTENT_TYPE: &str = "Content-Type";
pub const DATA_SERVICE_VERSION: &str = "DataServiceVersion";
pub const ETAG: &str = "ETag";
pub const IF_MATCH: &str = "If-Match";
pub const MAX_DATA_SERVICE_VERSION: &str = "MaxDataServiceVersion";
pub const MIME_VERSION: &str = "MIME-Version";
pub const ODATA_MAX_VERSION: &str = "OData-MaxVersion";
pub const ODATA_VERSION: &str = "OData-Version";
pub const SAP_CONTEXT_ID: &str = "SAP-ContextId";
pub const SAP_ERR_ID: &str = "SAP-Err-Id";
pub const SAP_HTTP_SESSION_TIMEOUT: &str = "SAP-Http-Session-Timeout";
pub const SAP_MESSAGES: &str = "sap-messages";
pub const X_CSRF_TOKEN: &str = "X-CSRF-Token";

static CANONICAL_NAMES: Lazy<HashMap<String, &'static str>> = Lazy::new(|| {
    [
        ACCEPT,
        "Accept-Language",
        "Content-ID",
        "Content-Transfer-Encoding",
        CONTENT_TYPE,
        DATA_SERVICE_VERSION,
        ETAG,
        IF_MATCH,
        "If-None-Match",
        MAX_DATA_SERVICE_VERSION,
        MIME_VERSION,
        ODATA_MAX_VERSION,
        ODATA_VERSION,
        "Prefer",
        "Preference-Applied",
        SAP_CONTEXT_ID,
        SAP_ERR_ID,
        SAP_HTTP_SESSION_TIMEOUT,
        SAP_MESSAGES,
        X_CSRF_TOKEN,
    ]
    .into_iter()
    .map(|name| (name.to_ascii_lowercase(), name))
    .collect()
});

/// Returns the canonical spelling of a header name.
///
/// Well-known OData and SAP headers keep their registered spelling; anything else is
/// title-cased per dash-separated segment.
pub fn canonical_name(name: &str) -> String {
    let lower = name.trim().to_ascii_lowercase();
    if let Some(known) = CANONICAL_NAMES.get(&lower) {
        return (*known).to_string();
    }

    lower
        .split('-')
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Header map with case-insensitive names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct Headers(BTreeMap<String, String>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a header, replacing any value stored under a differently cased name
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) -> Option<String> {
        self.0.insert(canonical_name(name.as_ref()), value.into())
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&canonical_name(name)).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(&canonical_name(name))
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.0.remove(&canonical_name(name))
    }

    /// Copies all headers of `other` into `self`; values of `other` win
    pub fn extend(&mut self, other: &Headers) {
        for (name, value) in &other.0 {
            self.0.insert(name.clone(), value.clone());
        }
    }

    /// Layers header maps left to right; later layers win
    pub fn merged(layers: &[&Headers]) -> Headers {
        let mut merged = Headers::new();
        for layer in layers {
            merged.extend(layer);
        }
        merged
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<BTreeMap<String, String>> for Headers {
    fn from(map: BTreeMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

impl From<Headers> for BTreeMap<String, String> {
    fn from(headers: Headers) -> Self {
        headers.0
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}
