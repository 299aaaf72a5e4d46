//! Outgoing request envelope

use crate::error::{ApiError, ApiResult};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// One logical API call
///
/// The bearer credential is attached by the gateway at send time, so the same
/// envelope can be replayed after a token refresh.
#[derive(Clone)]
pub struct ApiRequest {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) body: Option<Value>,
    pub(crate) bearer: Option<String>,
    pub(crate) recovery: Recovery,
}

/// Per-request unauthorized-recovery bookkeeping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Recovery {
    /// The forced logout already ran for this request
    pub(crate) retried: bool,
    /// A refresh-and-replay was already attempted
    pub(crate) refreshed: bool,
    /// Never run recovery (the refresh exchange itself)
    pub(crate) disabled: bool,
}

impl fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("has_body", &self.body.is_some())
            .field("bearer", &self.bearer.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl ApiRequest {
    /// Create a request for `path`, relative to the configured base URL
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            bearer: None,
            recovery: Recovery::default(),
        }
    }

    /// GET request
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// POST request
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// PUT request
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// DELETE request
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append query-string pairs
    #[must_use]
    pub fn query<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Attach a JSON body
    ///
    /// # Errors
    ///
    /// Returns a local error if `body` cannot be encoded as JSON.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> ApiResult<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::local("ENCODE_ERROR", format!("Failed to encode body: {e}")))?;
        self.body = Some(value);
        Ok(self)
    }

    /// HTTP method
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Path relative to the base URL
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query-string pairs in send order
    #[must_use]
    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    /// JSON body, if any
    #[must_use]
    pub const fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Whether a bearer credential was attached on the last send
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.bearer.is_some()
    }

    pub(crate) fn without_recovery(mut self) -> Self {
        self.recovery.disabled = true;
        self
    }
}
