//! `CacheStore`: the durable response cache used by sync handlers.

use super::memory::MemoryStore;
use super::sanitize::strip_volatile_fields;
use super::sqlite::SqliteStore;
use super::traits::{KeyValueBackend, StoreInfo};
use crate::config::{StoreConfig, StoreDriver};
use crate::error::{LocalSyncError, Result};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

/// Opens a backend for a configuration.
pub type BackendFactory =
    Arc<dyn Fn(&StoreConfig) -> Result<Arc<dyn KeyValueBackend>> + Send + Sync>;

/// Response cache over a key/value backend.
///
/// The backend is opened on first access and bound to the configuration the
/// store was constructed with. A failed open is not remembered, so the next
/// access tries again; once open, the handle lives as long as the store.
pub struct CacheStore {
    config: StoreConfig,
    factory: BackendFactory,
    backend: OnceCell<Arc<dyn KeyValueBackend>>,
}

impl CacheStore {
    /// Create a store that opens the backend selected by `config.driver`.
    pub fn new(config: StoreConfig) -> Self {
        Self::with_factory(config, Arc::new(open_backend))
    }

    /// Create a store with a custom backend factory.
    pub fn with_factory(config: StoreConfig, factory: BackendFactory) -> Self {
        Self {
            config,
            factory,
            backend: OnceCell::new(),
        }
    }

    /// Create a store over an already-open backend.
    pub fn with_backend(config: StoreConfig, backend: Arc<dyn KeyValueBackend>) -> Self {
        Self::with_factory(
            config,
            Arc::new(move |_: &StoreConfig| -> Result<Arc<dyn KeyValueBackend>> {
                Ok(backend.clone())
            }),
        )
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Whether the backend has been opened yet.
    pub fn is_initialized(&self) -> bool {
        self.backend.initialized()
    }

    /// Read the payload cached under `key`.
    pub async fn read(&self, key: &str) -> Result<Option<Value>> {
        debug!("Reading cached entry for {:?}", key);

        let owned_key = key.to_string();
        let bytes = self
            .run("read", move |backend| backend.get(&owned_key))
            .await?;

        let Some(bytes) = bytes else {
            return Ok(None);
        };

        let mut value: Value = serde_json::from_slice(&bytes).map_err(|e| LocalSyncError::Json {
            message: format!("Cached entry for {} is not valid JSON: {}", key, e),
            source: Some(e),
        })?;
        // Entries written around this store may still carry transport metadata
        self.sanitize(&mut value);

        Ok(Some(value))
    }

    /// Persist `value` under `key`, replacing any existing entry.
    ///
    /// Volatile fields are stripped from the stored copy.
    pub async fn write(&self, key: &str, value: &Value) -> Result<()> {
        debug!("Storing entry for {:?}", key);

        let mut value = value.clone();
        self.sanitize(&mut value);
        let bytes = serde_json::to_vec(&value)?;

        let owned_key = key.to_string();
        self.run("write", move |backend| backend.set(&owned_key, &bytes))
            .await
    }

    /// Delete the entry under `key`. Returns whether one existed.
    pub async fn remove(&self, key: &str) -> Result<bool> {
        let owned_key = key.to_string();
        self.run("remove", move |backend| backend.remove(&owned_key))
            .await
    }

    /// Delete every entry in the sub-store.
    pub async fn clear(&self) -> Result<usize> {
        self.run("clear", |backend| backend.clear()).await
    }

    /// All cached keys, sorted.
    pub async fn keys(&self) -> Result<Vec<String>> {
        self.run("keys", |backend| backend.keys()).await
    }

    /// Number of cached entries.
    pub async fn len(&self) -> Result<usize> {
        self.run("len", |backend| backend.len()).await
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Sub-store metadata and totals.
    pub async fn info(&self) -> Result<StoreInfo> {
        self.run("info", |backend| backend.info()).await
    }

    /// Strip the configured volatile fields from `value` in place.
    pub fn sanitize(&self, value: &mut Value) -> usize {
        strip_volatile_fields(value, &self.config.volatile_fields)
    }

    async fn backend(&self) -> Result<Arc<dyn KeyValueBackend>> {
        let backend = self
            .backend
            .get_or_try_init(|| async {
                let config = self.config.clone();
                let factory = self.factory.clone();
                let backend = tokio::task::spawn_blocking(move || factory(&config))
                    .await
                    .map_err(|e| LocalSyncError::Other(format!("Store open task failed: {}", e)))??;
                debug!(
                    "Bound {} backend to '{}/{}'",
                    backend.name(),
                    self.config.namespace,
                    self.config.sub_store_name
                );
                Ok::<_, LocalSyncError>(backend)
            })
            .await?;

        Ok(backend.clone())
    }

    /// Run a blocking backend operation off the async runtime.
    async fn run<T, F>(&self, op: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn KeyValueBackend) -> Result<T> + Send + 'static,
    {
        let backend = self.backend().await?;
        tokio::task::spawn_blocking(move || f(backend.as_ref()))
            .await
            .map_err(|e| LocalSyncError::Other(format!("Store {} task failed: {}", op, e)))?
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("config", &self.config)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

/// Default factory: open the backend selected by `config.driver`.
pub fn open_backend(config: &StoreConfig) -> Result<Arc<dyn KeyValueBackend>> {
    config.validate()?;
    match config.driver {
        StoreDriver::Sqlite => Ok(Arc::new(SqliteStore::open(config.clone())?)),
        StoreDriver::Memory => Ok(Arc::new(MemoryStore::new(config.clone()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn memory_store() -> CacheStore {
        CacheStore::new(StoreConfig::new().with_driver(StoreDriver::Memory))
    }

    #[tokio::test]
    async fn test_read_missing_key() {
        let store = memory_store();
        assert!(store.read("/themes").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let store = memory_store();

        store.write("/themes", &json!({"id": 7})).await.unwrap();
        assert_eq!(store.read("/themes").await.unwrap(), Some(json!({"id": 7})));
    }

    #[tokio::test]
    async fn test_write_strips_headers() {
        let store = memory_store();

        let response = json!({"id": 7, "_headers": {"Date": "Mon"}});
        store.write("/themes", &response).await.unwrap();
        store.write("/themes", &response).await.unwrap();

        let cached = store.read("/themes").await.unwrap().unwrap();
        assert!(cached.get("_headers").is_none());
        assert_eq!(cached, json!({"id": 7}));
    }

    #[tokio::test]
    async fn test_read_strips_headers_written_around_store() {
        let backend = Arc::new(MemoryStore::new(StoreConfig::default()));
        backend
            .set("/themes", br#"{"id":1,"_headers":{"x":"y"}}"#)
            .unwrap();
        let store = CacheStore::with_backend(StoreConfig::default(), backend);

        assert_eq!(store.read("/themes").await.unwrap(), Some(json!({"id": 1})));
    }

    #[tokio::test]
    async fn test_invalid_json_surfaces_error() {
        let backend = Arc::new(MemoryStore::new(StoreConfig::default()));
        backend.set("/themes", b"not json").unwrap();
        let store = CacheStore::with_backend(StoreConfig::default(), backend);

        let err = store.read("/themes").await.unwrap_err();
        assert!(err.is_cache_layer());
    }

    #[tokio::test]
    async fn test_lazy_open() {
        let opened = Arc::new(AtomicUsize::new(0));
        let counter = opened.clone();
        let store = CacheStore::with_factory(
            StoreConfig::default(),
            Arc::new(move |config: &StoreConfig| -> Result<Arc<dyn KeyValueBackend>> {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(MemoryStore::new(config.clone())) as Arc<dyn KeyValueBackend>)
            }),
        );

        assert!(!store.is_initialized());
        assert_eq!(opened.load(Ordering::SeqCst), 0);

        store.write("/a", &json!(1)).await.unwrap();
        store.read("/a").await.unwrap();
        store.keys().await.unwrap();

        assert!(store.is_initialized());
        assert_eq!(opened.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_open_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let store = CacheStore::with_factory(
            StoreConfig::default(),
            Arc::new(move |config: &StoreConfig| -> Result<Arc<dyn KeyValueBackend>> {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Err(LocalSyncError::Config {
                        message: "first open fails".to_string(),
                    });
                }
                Ok(Arc::new(MemoryStore::new(config.clone())) as Arc<dyn KeyValueBackend>)
            }),
        );

        assert!(store.read("/a").await.is_err());
        assert!(!store.is_initialized());
        assert!(store.read("/a").await.unwrap().is_none());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_sqlite_driver_is_durable() {
        let temp = TempDir::new().unwrap();
        let config = StoreConfig::new().with_path(temp.path().join("cache.sqlite"));

        {
            let store = CacheStore::new(config.clone());
            store.write("/themes", &json!({"id": 9})).await.unwrap();
        }

        let store = CacheStore::new(config);
        assert_eq!(store.read("/themes").await.unwrap(), Some(json!({"id": 9})));
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_remove_clear_keys() {
        let store = memory_store();

        store.write("/a", &json!(1)).await.unwrap();
        store.write("/b", &json!(2)).await.unwrap();

        assert_eq!(store.keys().await.unwrap(), vec!["/a", "/b"]);
        assert!(store.remove("/a").await.unwrap());
        assert_eq!(store.clear().await.unwrap(), 1);
        assert!(store.is_empty().await.unwrap());
    }
}
