//! Stale-while-revalidate decorator for remote fetches.
//!
//! For every call:
//! 1. Read the cache by request path. A hit answers the call immediately.
//! 2. Always fetch from the remote.
//! 3. On success, answer with the sanitized value if the cache did not
//!    already answer, then persist it.
//! 4. On failure, answer with the error only if the cache did not already
//!    answer.
//!
//! Each call is answered exactly once. Concurrent calls for the same key are
//! independent: no request coalescing, last write wins. There is no timeout;
//! a remote fetch that never resolves leaves its call pending.

use super::diagnostics::{DiagnosticSink, SyncEvent, TracingSink};
use super::fetch::RemoteFetch;
use super::pending::{response_slot, Delivery, PendingCall, PendingResponse, Responder};
use super::request::Request;
use crate::error::Result;
use crate::store::CacheStore;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Handles for one dispatched call.
#[derive(Debug)]
pub struct SyncCall {
    /// Resolves with the call's single answer.
    pub response: PendingResponse,
    /// Completes once the remote fetch finished and the cache write, if any,
    /// was attempted.
    pub revalidation: JoinHandle<()>,
}

impl SyncCall {
    /// Wait for the answer and for revalidation to finish.
    pub async fn settle(self) -> Result<Value> {
        let answer = self.response.await;
        if let Err(e) = self.revalidation.await {
            debug!("Revalidation task ended abnormally: {}", e);
        }
        answer
    }
}

/// Decorates a `RemoteFetch` with a `CacheStore`.
pub struct SyncHandler<F> {
    store: Arc<CacheStore>,
    remote: Arc<F>,
    sink: Arc<dyn DiagnosticSink>,
}

impl<F> Clone for SyncHandler<F> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            remote: self.remote.clone(),
            sink: self.sink.clone(),
        }
    }
}

impl<F: RemoteFetch + 'static> SyncHandler<F> {
    /// Wrap `remote`, reporting diagnostics through `tracing`.
    pub fn new(store: Arc<CacheStore>, remote: F) -> Self {
        Self::with_shared_remote(store, Arc::new(remote))
    }

    /// Wrap a remote that is shared with other handlers.
    pub fn with_shared_remote(store: Arc<CacheStore>, remote: Arc<F>) -> Self {
        Self {
            store,
            remote,
            sink: Arc::new(TracingSink),
        }
    }

    /// Replace the diagnostic sink.
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    pub fn remote(&self) -> &Arc<F> {
        &self.remote
    }

    /// Start a call and return its handles.
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch(&self, request: Request) -> SyncCall {
        let (responder, response) = response_slot(request.cache_key());
        let revalidation = tokio::spawn(run_call(
            self.store.clone(),
            self.remote.clone(),
            self.sink.clone(),
            request,
            responder,
        ));

        SyncCall {
            response,
            revalidation,
        }
    }

    /// Start a call and wait for its answer only.
    ///
    /// Revalidation keeps running after a cached answer is returned.
    pub async fn call(&self, request: Request) -> Result<Value> {
        self.dispatch(request).response.await
    }

    /// Callback form of `call`: `callback` runs exactly once with the answer.
    ///
    /// The returned handle completes after the callback ran and revalidation
    /// finished.
    pub fn call_with<C>(&self, request: Request, callback: C) -> JoinHandle<()>
    where
        C: FnOnce(Result<Value>) + Send + 'static,
    {
        let call = self.dispatch(request);
        tokio::spawn(async move {
            callback(call.response.await);
            if let Err(e) = call.revalidation.await {
                debug!("Revalidation task ended abnormally: {}", e);
            }
        })
    }
}

#[async_trait]
impl<F: RemoteFetch + 'static> RemoteFetch for SyncHandler<F> {
    async fn fetch(&self, request: &Request) -> Result<Value> {
        self.call(request.clone()).await
    }
}

async fn run_call<F: RemoteFetch + ?Sized>(
    store: Arc<CacheStore>,
    remote: Arc<F>,
    sink: Arc<dyn DiagnosticSink>,
    request: Request,
    responder: Responder,
) {
    let key = request.cache_key().to_string();
    let mut call = PendingCall::new(responder);

    match store.read(&key).await {
        Ok(Some(cached)) => {
            sink.record(SyncEvent::CacheHit { key: key.clone() });
            answer(&mut call, Ok(cached), sink.as_ref(), &key);
        }
        Ok(None) => sink.record(SyncEvent::CacheMiss { key: key.clone() }),
        Err(e) => sink.record(SyncEvent::CacheReadFailed {
            key: key.clone(),
            error: e.to_string(),
        }),
    }

    debug!("Requesting {:?} from remote", key);
    match remote.fetch(&request).await {
        Ok(mut fresh) => {
            store.sanitize(&mut fresh);
            let revalidated = call.is_answered();
            if !revalidated {
                answer(&mut call, Ok(fresh.clone()), sink.as_ref(), &key);
            }

            // The answer never waits on the cache write
            if let Err(e) = store.write(&key, &fresh).await {
                sink.record(SyncEvent::CacheWriteFailed {
                    key: key.clone(),
                    error: e.to_string(),
                });
            }
            if revalidated {
                sink.record(SyncEvent::Revalidated { key });
            }
        }
        Err(e) => {
            if let Some(Err(e)) = answer(&mut call, Err(e), sink.as_ref(), &key) {
                sink.record(SyncEvent::FetchErrorSuppressed {
                    key,
                    error: e.to_string(),
                });
            }
        }
    }
}

/// Deliver `result` if the call is still unanswered. Hands the result back
/// when the call had already been answered.
fn answer(
    call: &mut PendingCall,
    result: Result<Value>,
    sink: &dyn DiagnosticSink,
    key: &str,
) -> Option<Result<Value>> {
    match call.deliver(result) {
        Delivery::Delivered => None,
        Delivery::CallerGone => {
            sink.record(SyncEvent::CallerGone {
                key: key.to_string(),
            });
            None
        }
        Delivery::AlreadyAnswered(result) => Some(result),
    }
}
