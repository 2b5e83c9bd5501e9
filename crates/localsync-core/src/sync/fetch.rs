//! Remote fetch trait.

use super::request::Request;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// A remote read operation.
///
/// Each call resolves exactly once, with either the response payload or an
/// error. `SyncHandler` implements this trait too, so decorated operations
/// can be used anywhere the undecorated one was.
#[async_trait]
pub trait RemoteFetch: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Value>;
}

#[async_trait]
impl<T: RemoteFetch + ?Sized> RemoteFetch for Arc<T> {
    async fn fetch(&self, request: &Request) -> Result<Value> {
        (**self).fetch(request).await
    }
}

/// Adapter turning an async closure into a `RemoteFetch`.
pub struct FnFetch<F>(F);

/// Wrap `f` as a remote fetch operation.
pub fn fetch_fn<F, Fut>(f: F) -> FnFetch<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    FnFetch(f)
}

#[async_trait]
impl<F, Fut> RemoteFetch for FnFetch<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    async fn fetch(&self, request: &Request) -> Result<Value> {
        (self.0)(request.clone()).await
    }
}
