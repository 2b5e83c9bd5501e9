//! LocalSync Core - stale-while-revalidate caching for remote reads.
//!
//! Wraps a remote fetch operation with a durable local cache. A cached value
//! answers a call immediately; the remote is always consulted afterwards and
//! its result refreshes the cache for later calls. Every call is answered
//! exactly once.
//!
//! # Example
//!
//! ```rust,ignore
//! use localsync_core::{CacheStore, HttpFetcher, Request, StoreConfig, SyncHandler};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> localsync_core::Result<()> {
//!     let store = Arc::new(CacheStore::new(StoreConfig::new().with_namespace("themes-app")));
//!     let remote = HttpFetcher::new("https://public-api.wordpress.com/rest/v1.1")?;
//!     let themes = SyncHandler::new(store, remote);
//!
//!     // First run waits for the network; later runs answer from the cache.
//!     let value = themes.call(Request::new("/themes")).await?;
//!     println!("{}", value);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod store;
pub mod sync;

// Re-export commonly used types
pub use config::{StoreConfig, StoreDriver};
pub use error::{LocalSyncError, Result};
pub use http::HttpFetcher;
pub use store::{CacheStore, KeyValueBackend, MemoryStore, SqliteStore, StoreInfo, StoredEntry};
pub use sync::{
    fetch_fn, DiagnosticSink, PendingResponse, RecordingSink, RemoteFetch, Request, SyncCall,
    SyncEvent, SyncHandler, TracingSink,
};
