//! Durable response cache.
//!
//! `CacheStore` persists the last successful response per request path in a
//! key/value backend:
//! - SQLite (default, durable across restarts)
//! - in-memory (process-local)
//!
//! Volatile transport metadata is stripped before anything is persisted.

mod cache_store;
mod memory;
mod sanitize;
mod sqlite;
mod traits;

pub use cache_store::{open_backend, BackendFactory, CacheStore};
pub use memory::MemoryStore;
pub use sanitize::{has_volatile_fields, strip_volatile_fields};
pub use sqlite::SqliteStore;
pub use traits::{KeyValueBackend, StoreInfo, StoredEntry};
