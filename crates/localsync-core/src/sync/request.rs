//! Requests passed through a decorated fetch.

use serde::{Deserialize, Serialize};

/// A remote read request.
///
/// `path` identifies the resource and doubles as the cache key. Query
/// parameters are forwarded to the remote but do not take part in the key,
/// so two requests differing only in query share one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Resource path, e.g. `/sites/example.com/themes`.
    pub path: String,
    /// Query parameters in send order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub query: Vec<(String, String)>,
}

impl Request {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: Vec::new(),
        }
    }

    /// Append a query parameter.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// The key this request is cached under.
    pub fn cache_key(&self) -> &str {
        &self.path
    }
}

impl From<&str> for Request {
    fn from(path: &str) -> Self {
        Request::new(path)
    }
}

impl From<String> for Request {
    fn from(path: String) -> Self {
        Request::new(path)
    }
}
