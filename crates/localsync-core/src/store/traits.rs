//! Key/value backend trait and types.

use crate::config::StoreDriver;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted entry with metadata.
#[derive(Debug, Clone)]
pub struct StoredEntry {
    /// The entry key (request path).
    pub key: String,
    /// Serialized payload.
    pub value: Vec<u8>,
    /// Size of the payload in bytes.
    pub size_bytes: u64,
    /// When the entry was last written. Informational only, never expires.
    pub updated_at: DateTime<Utc>,
}

/// Metadata about a bound sub-store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreInfo {
    pub driver: StoreDriver,
    pub namespace: String,
    pub version: u32,
    pub sub_store_name: String,
    pub description: String,
    /// Number of entries in the sub-store.
    pub entry_count: usize,
    /// Total payload size in bytes.
    pub total_size_bytes: u64,
    /// Most recent write, if any.
    pub last_modified: Option<DateTime<Utc>>,
}

/// Generic key/value backend.
///
/// A backend is bound to one sub-store when it is opened. All operations are
/// synchronous to match rusqlite's API; `CacheStore` moves them off the async
/// runtime.
pub trait KeyValueBackend: Send + Sync {
    /// Short name for logging (e.g. "sqlite").
    fn name(&self) -> &'static str;

    /// Get the payload stored under `key`.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.get_entry(key).map(|opt| opt.map(|e| e.value))
    }

    /// Get the entry stored under `key` with its metadata.
    fn get_entry(&self, key: &str) -> Result<Option<StoredEntry>>;

    /// Store `value` under `key`, overwriting any existing entry.
    fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Delete `key`. Returns whether an entry existed.
    fn remove(&self, key: &str) -> Result<bool>;

    /// Delete every entry in the sub-store. Returns the number removed.
    fn clear(&self) -> Result<usize>;

    /// All keys in the sub-store, sorted.
    fn keys(&self) -> Result<Vec<String>>;

    /// Number of entries in the sub-store.
    fn len(&self) -> Result<usize> {
        self.keys().map(|k| k.len())
    }

    /// Sub-store metadata and totals.
    fn info(&self) -> Result<StoreInfo>;
}
