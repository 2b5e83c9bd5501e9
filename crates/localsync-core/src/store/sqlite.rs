//! SQLite-based durable key/value backend.

use super::traits::{KeyValueBackend, StoreInfo, StoredEntry};
use crate::config::{StoreConfig, StoreDriver};
use crate::error::{LocalSyncError, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// SQLite-based key/value backend.
///
/// All sub-stores of a namespace share one database file; rows are isolated
/// by `store_name`. Thread-safe via internal mutex on the connection.
pub struct SqliteStore {
    /// Database connection (wrapped for thread safety).
    conn: Arc<Mutex<Connection>>,
    /// Configuration this backend is bound to.
    config: StoreConfig,
    /// Resolved database location.
    db_path: PathBuf,
}

impl SqliteStore {
    /// Open (or create) the database described by `config`.
    pub fn open(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let db_path = config.resolve_db_path()?;
        Self::open_at(&db_path, config)
    }

    /// Open the database at an explicit path, ignoring `config.path`.
    pub fn open_at(db_path: impl AsRef<Path>, config: StoreConfig) -> Result<Self> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| LocalSyncError::Io {
                    message: format!("Failed to create store directory: {}", e),
                    path: Some(parent.to_path_buf()),
                    source: Some(e),
                })?;
            }
        }

        let conn = Connection::open(db_path).map_err(|e| LocalSyncError::Database {
            message: format!("Failed to open store database: {}", e),
            source: Some(e),
        })?;

        // WAL lets concurrent readers proceed during a write
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| LocalSyncError::Database {
                message: format!("Failed to set pragmas: {}", e),
                source: Some(e),
            })?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            config,
            db_path: db_path.to_path_buf(),
        };

        store.init_schema()?;
        store.register_sub_store()?;

        debug!(
            "Opened sqlite store '{}/{}' at {}",
            store.config.namespace,
            store.config.sub_store_name,
            store.db_path.display()
        );

        Ok(store)
    }

    /// Location of the database file.
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| LocalSyncError::Database {
            message: format!("Failed to lock database: {}", e),
            source: None,
        })
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv_entries (
                store_name TEXT NOT NULL,
                key TEXT NOT NULL,
                value BLOB NOT NULL,
                size_bytes INTEGER NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (store_name, key)
            );

            CREATE INDEX IF NOT EXISTS idx_kv_updated
                ON kv_entries(store_name, updated_at);

            CREATE TABLE IF NOT EXISTS kv_stores (
                store_name TEXT PRIMARY KEY,
                namespace TEXT NOT NULL,
                version INTEGER NOT NULL,
                description TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| LocalSyncError::Database {
            message: format!("Failed to initialize store schema: {}", e),
            source: Some(e),
        })?;

        Ok(())
    }

    /// Record this sub-store's configuration. Re-registering is a no-op
    /// unless the schema version changed. A sub-store belongs to the
    /// namespace that created it.
    fn register_sub_store(&self) -> Result<()> {
        let conn = self.lock()?;
        let store_name = &self.config.sub_store_name;

        let recorded: Option<(u32, String)> = conn
            .query_row(
                "SELECT version, namespace FROM kv_stores WHERE store_name = ?1",
                params![store_name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        if let Some((_, namespace)) = &recorded {
            if *namespace != self.config.namespace {
                return Err(LocalSyncError::Config {
                    message: format!(
                        "Sub-store '{}' in {} belongs to namespace '{}', not '{}'",
                        store_name,
                        self.db_path.display(),
                        namespace,
                        self.config.namespace
                    ),
                });
            }
        }

        match recorded.map(|(version, _)| version) {
            None => {
                conn.execute(
                    r#"
                    INSERT INTO kv_stores (store_name, namespace, version, description, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    "#,
                    params![
                        store_name,
                        self.config.namespace,
                        self.config.version,
                        self.config.description,
                        Utc::now().to_rfc3339()
                    ],
                )
                .map_err(|e| LocalSyncError::Database {
                    message: format!("Failed to register sub-store {}: {}", store_name, e),
                    source: Some(e),
                })?;
            }
            Some(version) if version != self.config.version => {
                warn!(
                    "Sub-store '{}' was created with version {}, now opened as version {}",
                    store_name, version, self.config.version
                );
                conn.execute(
                    "UPDATE kv_stores SET version = ?1, description = ?2 WHERE store_name = ?3",
                    params![self.config.version, self.config.description, store_name],
                )?;
            }
            Some(_) => {}
        }

        Ok(())
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

impl KeyValueBackend for SqliteStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn get_entry(&self, key: &str) -> Result<Option<StoredEntry>> {
        let conn = self.lock()?;

        let row: Option<(Vec<u8>, i64, String)> = conn
            .query_row(
                r#"
                SELECT value, size_bytes, updated_at
                FROM kv_entries
                WHERE store_name = ?1 AND key = ?2
                "#,
                params![self.config.sub_store_name, key],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(|e| LocalSyncError::Database {
                message: format!("Failed to query entry {}: {}", key, e),
                source: Some(e),
            })?;

        Ok(row.map(|(value, size_bytes, updated_at)| StoredEntry {
            key: key.to_string(),
            value,
            size_bytes: size_bytes as u64,
            updated_at: parse_timestamp(&updated_at).unwrap_or_else(Utc::now),
        }))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            r#"
            INSERT OR REPLACE INTO kv_entries (store_name, key, value, size_bytes, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                self.config.sub_store_name,
                key,
                value,
                value.len() as i64,
                Utc::now().to_rfc3339()
            ],
        )
        .map_err(|e| LocalSyncError::Database {
            message: format!("Failed to set entry {}: {}", key, e),
            source: Some(e),
        })?;

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let conn = self.lock()?;

        let deleted = conn
            .execute(
                "DELETE FROM kv_entries WHERE store_name = ?1 AND key = ?2",
                params![self.config.sub_store_name, key],
            )
            .map_err(|e| LocalSyncError::Database {
                message: format!("Failed to remove entry {}: {}", key, e),
                source: Some(e),
            })?;

        Ok(deleted > 0)
    }

    fn clear(&self) -> Result<usize> {
        let conn = self.lock()?;

        let deleted = conn
            .execute(
                "DELETE FROM kv_entries WHERE store_name = ?1",
                params![self.config.sub_store_name],
            )
            .map_err(|e| LocalSyncError::Database {
                message: format!("Failed to clear sub-store: {}", e),
                source: Some(e),
            })?;

        debug!(
            "Cleared {} entries from sub-store '{}'",
            deleted, self.config.sub_store_name
        );

        Ok(deleted)
    }

    fn keys(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare("SELECT key FROM kv_entries WHERE store_name = ?1 ORDER BY key")
            .map_err(|e| LocalSyncError::Database {
                message: format!("Failed to prepare keys query: {}", e),
                source: Some(e),
            })?;

        let keys = stmt
            .query_map(params![self.config.sub_store_name], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(keys)
    }

    fn len(&self) -> Result<usize> {
        let conn = self.lock()?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM kv_entries WHERE store_name = ?1",
            params![self.config.sub_store_name],
            |row| row.get(0),
        )?;

        Ok(count as usize)
    }

    fn info(&self) -> Result<StoreInfo> {
        let conn = self.lock()?;

        let (count, size, last_modified): (i64, i64, Option<String>) = conn.query_row(
            r#"
            SELECT COUNT(*), COALESCE(SUM(size_bytes), 0), MAX(updated_at)
            FROM kv_entries
            WHERE store_name = ?1
            "#,
            params![self.config.sub_store_name],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let (namespace, version, description): (String, u32, String) = conn
            .query_row(
                "SELECT namespace, version, description FROM kv_stores WHERE store_name = ?1",
                params![self.config.sub_store_name],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?
            .unwrap_or_else(|| {
                (
                    self.config.namespace.clone(),
                    self.config.version,
                    self.config.description.clone(),
                )
            });

        Ok(StoreInfo {
            driver: StoreDriver::Sqlite,
            namespace,
            version,
            sub_store_name: self.config.sub_store_name.clone(),
            description,
            entry_count: count as usize,
            total_size_bytes: size as u64,
            last_modified: last_modified.as_deref().and_then(parse_timestamp),
        })
    }
}
