//! Immutable request descriptions
//!
//! A [`RequestSpec`] is built once per logical operation and cloned for every
//! attempt or part, so headers added for one attempt never leak into the next.

use std::collections::BTreeMap;

use bytes::Bytes;
use http::Method;
use jiff::Timestamp;

pub const CONTENT_LENGTH: &str = "content-length";
pub const CONTENT_MD5: &str = "content-md5";
pub const CONTENT_TYPE: &str = "content-type";

pub const X_UPYUN_PART_ID: &str = "x-upyun-part-id";
pub const X_UPYUN_MULTI_STAGE: &str = "x-upyun-multi-stage";
pub const X_UPYUN_MULTI_TYPE: &str = "x-upyun-multi-type";
pub const X_UPYUN_MULTI_LENGTH: &str = "x-upyun-multi-length";
pub const X_UPYUN_MULTI_MD5: &str = "x-upyun-multi-md5";
pub const X_UPYUN_MULTI_UUID: &str = "x-upyun-multi-uuid";
pub const X_UPYUN_ASYNC: &str = "x-upyun-async";

pub const X_LIST_LIMIT: &str = "x-list-limit";
pub const X_LIST_ORDER: &str = "x-list-order";
pub const X_LIST_ITER: &str = "x-list-iter";
pub const X_UPYUN_LIST_ITER: &str = "x-upyun-list-iter";

pub const X_UPYUN_FILE_TYPE: &str = "x-upyun-file-type";
pub const X_UPYUN_FILE_SIZE: &str = "x-upyun-file-size";
pub const X_UPYUN_FILE_DATE: &str = "x-upyun-file-date";

/// Format a timestamp the way the `Date` header expects
/// (`Wed, 29 Oct 2014 02:26:58 GMT`).
pub fn http_date(ts: Timestamp) -> String {
    ts.strftime("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Percent-encode every segment of a path, keeping the separators
pub fn escape_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Ensure a key starts with `/`
pub fn normalize_key(key: &str) -> String {
    if key.starts_with('/') {
        key.to_string()
    } else {
        format!("/{key}")
    }
}

/// Method, key, query, headers and body of one REST call
///
/// Header names are stored lowercased, so each name appears at most once
/// regardless of the casing callers use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    method: Method,
    key: String,
    query: Option<String>,
    headers: BTreeMap<String, String>,
    body: Option<Bytes>,
}

impl RequestSpec {
    pub fn new(method: Method, key: &str) -> Self {
        Self {
            method,
            key: normalize_key(key),
            query: None,
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn get(key: &str) -> Self {
        Self::new(Method::GET, key)
    }

    pub fn head(key: &str) -> Self {
        Self::new(Method::HEAD, key)
    }

    pub fn put(key: &str) -> Self {
        Self::new(Method::PUT, key)
    }

    pub fn post(key: &str) -> Self {
        Self::new(Method::POST, key)
    }

    pub fn delete(key: &str) -> Self {
        Self::new(Method::DELETE, key)
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (name, value) in headers {
            self.headers
                .insert(name.as_ref().to_ascii_lowercase(), value.into());
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Key relative to the bucket, always starting with `/`
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Length used for signing: the explicit header, else the body size
    pub fn declared_length(&self) -> String {
        match (self.header(CONTENT_LENGTH), &self.body) {
            (Some(length), _) => length.to_string(),
            (None, Some(body)) => body.len().to_string(),
            (None, None) => "0".to_string(),
        }
    }

    /// Whether the body should be sent at all; GET and HEAD never carry one
    pub fn sends_body(&self) -> bool {
        self.body.is_some() && self.method != Method::GET && self.method != Method::HEAD
    }
}
