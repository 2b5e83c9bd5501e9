//! Store configuration.
//!
//! A `StoreConfig` describes where and how a `CacheStore` persists entries.
//! Every field has a default; callers override any subset with the `with_*`
//! methods, struct-update syntax, or by loading a JSON file.

use crate::error::{LocalSyncError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Storage engine selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreDriver {
    /// Durable SQLite database file.
    Sqlite,
    /// Process-local map. Lost when the process exits.
    Memory,
}

impl StoreDriver {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreDriver::Sqlite => "sqlite",
            StoreDriver::Memory => "memory",
        }
    }
}

impl std::fmt::Display for StoreDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StoreDriver {
    type Err = LocalSyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(StoreDriver::Sqlite),
            "memory" => Ok(StoreDriver::Memory),
            other => Err(LocalSyncError::Config {
                message: format!("Unknown store driver: {}", other),
            }),
        }
    }
}

/// Configuration for a `CacheStore`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct StoreConfig {
    /// Storage engine.
    pub driver: StoreDriver,
    /// Application identifier. Also names the default database file.
    pub namespace: String,
    /// Schema version recorded alongside the sub-store.
    pub version: u32,
    /// Logical collection holding the entries.
    pub sub_store_name: String,
    /// Free text stored with the sub-store metadata.
    pub description: String,
    /// Database file for the SQLite driver. `None` resolves to the platform
    /// cache directory.
    pub path: Option<PathBuf>,
    /// Top-level response fields stripped before an entry is persisted.
    pub volatile_fields: Vec<String>,
}

impl StoreConfig {
    pub const DEFAULT_NAMESPACE: &'static str = "localsync";
    pub const DEFAULT_VERSION: u32 = 1;
    pub const DEFAULT_SUB_STORE_NAME: &'static str = "keyvaluepairs";
    pub const DEFAULT_DESCRIPTION: &'static str = "LocalSync response cache";
    /// Response metadata injected by the HTTP layer.
    pub const HEADERS_FIELD: &'static str = "_headers";
    pub const DB_FILE_EXTENSION: &'static str = "sqlite";

    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).map_err(|e| LocalSyncError::io_with_path(e, path))?;
        let config: StoreConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_driver(mut self, driver: StoreDriver) -> Self {
        self.driver = driver;
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_sub_store_name(mut self, name: impl Into<String>) -> Self {
        self.sub_store_name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_volatile_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.volatile_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Reject configurations no backend can bind to.
    pub fn validate(&self) -> Result<()> {
        if self.namespace.trim().is_empty() {
            return Err(LocalSyncError::Config {
                message: "namespace must not be empty".to_string(),
            });
        }
        if self.sub_store_name.trim().is_empty() {
            return Err(LocalSyncError::Config {
                message: "sub_store_name must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Resolve the SQLite database location.
    ///
    /// Falls back to `<cache dir>/localsync/<namespace>.sqlite`.
    pub fn resolve_db_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }

        let base = dirs::cache_dir().ok_or_else(|| LocalSyncError::Config {
            message: "No platform cache directory available; set an explicit path".to_string(),
        })?;

        Ok(base.join(Self::DEFAULT_NAMESPACE).join(format!(
            "{}.{}",
            self.namespace,
            Self::DB_FILE_EXTENSION
        )))
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            driver: StoreDriver::Sqlite,
            namespace: Self::DEFAULT_NAMESPACE.to_string(),
            version: Self::DEFAULT_VERSION,
            sub_store_name: Self::DEFAULT_SUB_STORE_NAME.to_string(),
            description: Self::DEFAULT_DESCRIPTION.to_string(),
            path: None,
            volatile_fields: vec![Self::HEADERS_FIELD.to_string()],
        }
    }
}
