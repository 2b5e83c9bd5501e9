//! Error types for LocalSync.
//!
//! Cache-layer variants (`Database`, `Io`, `Json`, `Config`) are absorbed by
//! the sync handler and reported to its diagnostic sink. Remote variants
//! (`Network`, `Timeout`, `RateLimited`, `Remote`) are the only ones that can
//! reach a caller of a decorated operation.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the LocalSync library.
#[derive(Debug, Error)]
pub enum LocalSyncError {
    // Remote errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Rate limited by {service}, retry after {retry_after_secs:?} seconds")]
    RateLimited {
        service: String,
        retry_after_secs: Option<u64>,
    },

    #[error("Remote returned {status} for {path}: {message}")]
    Remote {
        status: u16,
        path: String,
        message: String,
    },

    // Storage errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid request path: {0}")]
    InvalidPath(String),

    // Call lifecycle
    #[error("Response for {key} was dropped before it was delivered")]
    ResponseDropped { key: String },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for LocalSync operations.
pub type Result<T> = std::result::Result<T, LocalSyncError>;

impl From<std::io::Error> for LocalSyncError {
    fn from(err: std::io::Error) -> Self {
        LocalSyncError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for LocalSyncError {
    fn from(err: serde_json::Error) -> Self {
        LocalSyncError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for LocalSyncError {
    fn from(err: rusqlite::Error) -> Self {
        LocalSyncError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for LocalSyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LocalSyncError::Timeout(std::time::Duration::from_secs(0))
        } else {
            LocalSyncError::Network {
                message: err.to_string(),
                source: Some(err),
            }
        }
    }
}

impl LocalSyncError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        LocalSyncError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Check if this error should trigger a retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            LocalSyncError::Network { .. }
            | LocalSyncError::Timeout(_)
            | LocalSyncError::RateLimited { .. } => true,
            LocalSyncError::Remote { status, .. } => {
                matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
            }
            _ => false,
        }
    }

    /// Whether the error originated in the local cache layer.
    ///
    /// These never cross the decorator boundary.
    pub fn is_cache_layer(&self) -> bool {
        matches!(
            self,
            LocalSyncError::Database { .. }
                | LocalSyncError::Io { .. }
                | LocalSyncError::Json { .. }
                | LocalSyncError::Config { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LocalSyncError::Remote {
            status: 404,
            path: "/themes".into(),
            message: "Not Found".into(),
        };
        assert_eq!(err.to_string(), "Remote returned 404 for /themes: Not Found");
    }

    #[test]
    fn test_retryable_errors() {
        assert!(LocalSyncError::Timeout(std::time::Duration::from_secs(5)).is_retryable());
        assert!(LocalSyncError::Remote {
            status: 503,
            path: "/".into(),
            message: String::new(),
        }
        .is_retryable());
        assert!(!LocalSyncError::Remote {
            status: 404,
            path: "/".into(),
            message: String::new(),
        }
        .is_retryable());
    }

    #[test]
    fn test_cache_layer_classification() {
        let db = LocalSyncError::Database {
            message: "locked".into(),
            source: None,
        };
        assert!(db.is_cache_layer());
        assert!(!LocalSyncError::Timeout(std::time::Duration::from_secs(1)).is_cache_layer());
    }
}
