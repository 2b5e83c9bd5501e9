//! Process-local in-memory backend.

use super::traits::{KeyValueBackend, StoreInfo, StoredEntry};
use crate::config::{StoreConfig, StoreDriver};
use crate::error::{LocalSyncError, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// In-memory key/value backend.
///
/// Satisfies the backend contract except durability: entries are lost when
/// the store is dropped.
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, StoredEntry>>,
    config: StoreConfig,
}

impl MemoryStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            config,
        }
    }

    fn read_guard(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, StoredEntry>>> {
        self.entries
            .read()
            .map_err(|e| LocalSyncError::Other(format!("Memory store lock poisoned: {}", e)))
    }

    fn write_guard(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, StoredEntry>>> {
        self.entries
            .write()
            .map_err(|e| LocalSyncError::Other(format!("Memory store lock poisoned: {}", e)))
    }
}

impl KeyValueBackend for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get_entry(&self, key: &str) -> Result<Option<StoredEntry>> {
        Ok(self.read_guard()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let entry = StoredEntry {
            key: key.to_string(),
            value: value.to_vec(),
            size_bytes: value.len() as u64,
            updated_at: Utc::now(),
        };
        self.write_guard()?.insert(key.to_string(), entry);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.write_guard()?.remove(key).is_some())
    }

    fn clear(&self) -> Result<usize> {
        let mut entries = self.write_guard()?;
        let count = entries.len();
        entries.clear();
        Ok(count)
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.read_guard()?.keys().cloned().collect())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.read_guard()?.len())
    }

    fn info(&self) -> Result<StoreInfo> {
        let entries = self.read_guard()?;

        Ok(StoreInfo {
            driver: StoreDriver::Memory,
            namespace: self.config.namespace.clone(),
            version: self.config.version,
            sub_store_name: self.config.sub_store_name.clone(),
            description: self.config.description.clone(),
            entry_count: entries.len(),
            total_size_bytes: entries.values().map(|e| e.size_bytes).sum(),
            last_modified: entries.values().map(|e| e.updated_at).max(),
        })
    }
}
