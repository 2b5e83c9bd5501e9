//! Stale-while-revalidate decoration of remote fetch operations.
//!
//! `SyncHandler` wraps any `RemoteFetch` with a `CacheStore`: cached values
//! answer immediately, the remote is always consulted, and fresh values are
//! persisted for later calls.

mod diagnostics;
mod fetch;
mod handler;
mod pending;
mod request;

pub use diagnostics::{DiagnosticSink, RecordingSink, SyncEvent, TracingSink};
pub use fetch::{fetch_fn, FnFetch, RemoteFetch};
pub use handler::{SyncCall, SyncHandler};
pub use pending::{response_slot, Delivery, PendingCall, PendingResponse, Responder};
pub use request::Request;
