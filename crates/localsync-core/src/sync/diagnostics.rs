//! Diagnostic events emitted by sync handlers.
//!
//! Cache-layer failures and suppressed remote errors never reach the caller
//! of a decorated operation. They are reported to a `DiagnosticSink` instead,
//! which defaults to `tracing`.

use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Something noteworthy that happened during one decorated call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A cached value was delivered before the remote fetch.
    CacheHit { key: String },
    /// No cached value; the call waits for the remote fetch.
    CacheMiss { key: String },
    /// Reading the cache failed; treated as a miss.
    CacheReadFailed { key: String, error: String },
    /// Persisting a fresh value failed; the response is unaffected.
    CacheWriteFailed { key: String, error: String },
    /// The remote failed after a cached value was already delivered.
    FetchErrorSuppressed { key: String, error: String },
    /// A fresh value was persisted after a cached value was delivered.
    Revalidated { key: String },
    /// The caller stopped waiting before any answer was delivered.
    CallerGone { key: String },
}

impl SyncEvent {
    pub fn key(&self) -> &str {
        match self {
            SyncEvent::CacheHit { key }
            | SyncEvent::CacheMiss { key }
            | SyncEvent::CacheReadFailed { key, .. }
            | SyncEvent::CacheWriteFailed { key, .. }
            | SyncEvent::FetchErrorSuppressed { key, .. }
            | SyncEvent::Revalidated { key }
            | SyncEvent::CallerGone { key } => key,
        }
    }

    /// Whether the event reports a swallowed failure.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            SyncEvent::CacheReadFailed { .. }
                | SyncEvent::CacheWriteFailed { .. }
                | SyncEvent::FetchErrorSuppressed { .. }
        )
    }
}

/// Receives diagnostic events from sync handlers.
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, event: SyncEvent);
}

impl<T: DiagnosticSink + ?Sized> DiagnosticSink for Arc<T> {
    fn record(&self, event: SyncEvent) {
        (**self).record(event)
    }
}

/// Forwards events to `tracing`: failures at warn, the rest at debug.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&self, event: SyncEvent) {
        match event {
            SyncEvent::CacheHit { key } => {
                debug!("{:?} already stored, answering from cache", key)
            }
            SyncEvent::CacheMiss { key } => debug!("{:?} not cached, waiting for remote", key),
            SyncEvent::CacheReadFailed { key, error } => {
                warn!("Cache read for {:?} failed, treating as miss: {}", key, error)
            }
            SyncEvent::CacheWriteFailed { key, error } => {
                warn!("Cache write for {:?} failed: {}", key, error)
            }
            SyncEvent::FetchErrorSuppressed { key, error } => {
                warn!(
                    "Remote fetch for {:?} failed after cached answer was sent: {}",
                    key, error
                )
            }
            SyncEvent::Revalidated { key } => debug!("Refreshed cache entry for {:?}", key),
            SyncEvent::CallerGone { key } => {
                debug!("Caller for {:?} stopped waiting before an answer", key)
            }
        }
    }
}

/// Collects events in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SyncEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<SyncEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Number of recorded events matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&SyncEvent) -> bool) -> usize {
        self.events().iter().filter(|e| predicate(e)).count()
    }

    pub fn failures(&self) -> Vec<SyncEvent> {
        self.events().into_iter().filter(SyncEvent::is_failure).collect()
    }
}

impl DiagnosticSink for RecordingSink {
    fn record(&self, event: SyncEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
