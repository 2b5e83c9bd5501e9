//! HTTP remote for JSON REST APIs.
//!
//! `HttpFetcher` issues GET requests relative to a base URL. When the body is
//! a JSON object, the response headers are attached under `_headers` so
//! callers of the undecorated fetch can see them; `CacheStore` strips that
//! field before anything is persisted.

use crate::config::StoreConfig;
use crate::error::{LocalSyncError, Result};
use crate::sync::{RemoteFetch, Request};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Longest remote error body kept in an error message.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// reqwest-backed `RemoteFetch`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpFetcher {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
    pub const USER_AGENT: &'static str = concat!("localsync/", env!("CARGO_PKG_VERSION"));

    /// Create a fetcher for `base_url` with the default timeout.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, Self::DEFAULT_TIMEOUT)
    }

    /// Create a fetcher with a custom request timeout.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base_url = Url::parse(base_url).map_err(|e| LocalSyncError::Config {
            message: format!("Invalid base URL {}: {}", base_url, e),
        })?;

        if base_url.cannot_be_a_base() {
            return Err(LocalSyncError::Config {
                message: format!("Base URL {} cannot carry a path", base_url),
            });
        }

        // Url::join replaces the last segment unless the path ends in '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(Self::USER_AGENT)
            .build()
            .map_err(|e| LocalSyncError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                source: Some(e),
            })?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Absolute URL for `request`, including its query.
    pub fn url_for(&self, request: &Request) -> Result<Url> {
        let relative = request.path.trim_start_matches('/');
        if request.path.is_empty() || relative.contains("://") {
            return Err(LocalSyncError::InvalidPath(request.path.clone()));
        }

        let mut url = self
            .base_url
            .join(relative)
            .map_err(|_| LocalSyncError::InvalidPath(request.path.clone()))?;

        if !request.query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(request.query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }

        Ok(url)
    }
}

impl HttpFetcher {
    fn transport_error(&self, url: &Url, e: reqwest::Error) -> LocalSyncError {
        if e.is_timeout() {
            LocalSyncError::Timeout(self.timeout)
        } else {
            LocalSyncError::Network {
                message: format!("GET {} failed: {}", url, e),
                source: Some(e),
            }
        }
    }
}

#[async_trait]
impl RemoteFetch for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Value> {
        let url = self.url_for(request)?;
        debug!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.transport_error(&url, e))?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());

            return Err(LocalSyncError::RateLimited {
                service: url.host_str().unwrap_or("unknown").to_string(),
                retry_after_secs: retry_after,
            });
        }

        let headers = headers_to_json(response.headers());
        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(&url, e))?;

        if !status.is_success() {
            return Err(LocalSyncError::Remote {
                status: status.as_u16(),
                path: request.path.clone(),
                message: error_message(&body, status),
            });
        }

        let mut value: Value = serde_json::from_slice(&body).map_err(|e| LocalSyncError::Json {
            message: format!("Response from {} is not valid JSON: {}", url, e),
            source: Some(e),
        })?;

        if let Value::Object(map) = &mut value {
            map.insert(StoreConfig::HEADERS_FIELD.to_string(), headers);
        }

        Ok(value)
    }
}

/// Flatten response headers into a JSON object. Repeated headers are joined
/// with ", "; non-UTF-8 values are skipped.
fn headers_to_json(headers: &HeaderMap) -> Value {
    let mut map = Map::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else {
            continue;
        };
        match map.get_mut(name.as_str()) {
            Some(Value::String(existing)) => {
                existing.push_str(", ");
                existing.push_str(value);
            }
            _ => {
                map.insert(name.as_str().to_string(), Value::String(value.to_string()));
            }
        }
    }
    Value::Object(map)
}

/// Prefer the API's own `message` field; fall back to the raw body or the
/// status reason.
fn error_message(body: &[u8], status: StatusCode) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(body) {
        if let Some(Value::String(message)) = map.get("message") {
            return message.clone();
        }
    }

    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Unknown status")
            .to_string()
    } else {
        text.chars().take(MAX_ERROR_BODY_CHARS).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_url_for_joins_base_path() {
        let fetcher = HttpFetcher::new("https://public-api.example.com/rest/v1.1").unwrap();

        let url = fetcher
            .url_for(&Request::new("/sites/example.com/themes").with_query("number", "20"))
            .unwrap();

        assert_eq!(
            url.as_str(),
            "https://public-api.example.com/rest/v1.1/sites/example.com/themes?number=20"
        );
    }

    #[test]
    fn test_url_for_rejects_absolute_paths() {
        let fetcher = HttpFetcher::new("https://example.com/").unwrap();
        assert!(matches!(
            fetcher.url_for(&Request::new("https://evil.example/x")),
            Err(LocalSyncError::InvalidPath(_))
        ));
        assert!(fetcher.url_for(&Request::new("")).is_err());
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            HttpFetcher::new("not a url"),
            Err(LocalSyncError::Config { .. })
        ));
        assert!(HttpFetcher::new("mailto:someone@example.com").is_err());
    }

    #[test]
    fn test_headers_to_json_joins_repeats() {
        let mut headers = HeaderMap::new();
        headers.append("x-tag", HeaderValue::from_static("a"));
        headers.append("x-tag", HeaderValue::from_static("b"));
        headers.insert("date", HeaderValue::from_static("Mon"));

        let json = headers_to_json(&headers);
        assert_eq!(json["x-tag"], "a, b");
        assert_eq!(json["date"], "Mon");
    }

    #[test]
    fn test_error_message_prefers_api_message() {
        let body = br#"{"error": "unknown_blog", "message": "Unknown blog"}"#;
        assert_eq!(error_message(body, StatusCode::NOT_FOUND), "Unknown blog");
        assert_eq!(error_message(b"", StatusCode::NOT_FOUND), "Not Found");
        assert_eq!(error_message(b" oops ", StatusCode::BAD_GATEWAY), "oops");
    }
}
