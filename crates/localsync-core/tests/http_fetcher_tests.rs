//! Integration tests for `HttpFetcher` against an in-process HTTP server.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use localsync_core::{
    CacheStore, HttpFetcher, LocalSyncError, RemoteFetch, Request, StoreConfig, StoreDriver,
    SyncHandler,
};
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

async fn themes() -> impl IntoResponse {
    (
        [("x-request-id", "req-42")],
        Json(json!({"id": 7, "name": "Twenty Twenty"})),
    )
}

async fn echo_query(
    axum::extract::Query(params): axum::extract::Query<HashMap<String, String>>,
) -> impl IntoResponse {
    Json(json!({"params": params}))
}

async fn missing() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": "unknown_theme", "message": "Theme not found"})),
    )
}

async fn limited() -> impl IntoResponse {
    (StatusCode::TOO_MANY_REQUESTS, [("retry-after", "30")], "slow down")
}

async fn not_json() -> impl IntoResponse {
    "plain text"
}

async fn stalled_body() -> impl IntoResponse {
    let chunk = futures::stream::once(async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok::<_, std::io::Error>("{}")
    });
    axum::body::Body::from_stream(chunk)
}

async fn spawn_server() -> SocketAddr {
    let app = Router::new()
        .route("/rest/v1/themes", get(themes))
        .route("/rest/v1/echo", get(echo_query))
        .route("/rest/v1/missing", get(missing))
        .route("/rest/v1/limited", get(limited))
        .route("/rest/v1/text", get(not_json))
        .route("/rest/v1/stalled", get(stalled_body));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn fetcher(addr: SocketAddr) -> HttpFetcher {
    HttpFetcher::new(&format!("http://{}/rest/v1", addr)).unwrap()
}

#[tokio::test]
async fn test_fetch_attaches_headers() {
    let addr = spawn_server().await;

    let value = fetcher(addr).fetch(&Request::new("/themes")).await.unwrap();

    assert_eq!(value["id"], 7);
    assert_eq!(value["_headers"]["x-request-id"], "req-42");
    assert_eq!(value["_headers"]["content-type"], "application/json");
}

#[tokio::test]
async fn test_fetch_forwards_query() {
    let addr = spawn_server().await;

    let request = Request::new("/echo").with_query("number", "20");
    let value = fetcher(addr).fetch(&request).await.unwrap();

    assert_eq!(value["params"]["number"], "20");
}

#[tokio::test]
async fn test_fetch_maps_status_errors() {
    let addr = spawn_server().await;
    let fetcher = fetcher(addr);

    match fetcher.fetch(&Request::new("/missing")).await {
        Err(LocalSyncError::Remote {
            status,
            path,
            message,
        }) => {
            assert_eq!(status, 404);
            assert_eq!(path, "/missing");
            assert_eq!(message, "Theme not found");
        }
        other => panic!("expected remote error, got {:?}", other),
    }

    match fetcher.fetch(&Request::new("/limited")).await {
        Err(LocalSyncError::RateLimited {
            retry_after_secs, ..
        }) => assert_eq!(retry_after_secs, Some(30)),
        other => panic!("expected rate limit, got {:?}", other),
    }
}

#[tokio::test]
async fn test_fetch_rejects_non_json_body() {
    let addr = spawn_server().await;

    let err = fetcher(addr)
        .fetch(&Request::new("/text"))
        .await
        .unwrap_err();
    assert!(matches!(err, LocalSyncError::Json { .. }));
}

#[tokio::test]
async fn test_stalled_body_reports_configured_timeout() {
    let addr = spawn_server().await;
    let timeout = Duration::from_millis(200);
    let fetcher =
        HttpFetcher::with_timeout(&format!("http://{}/rest/v1", addr), timeout).unwrap();

    let err = fetcher.fetch(&Request::new("/stalled")).await.unwrap_err();
    assert!(
        matches!(err, LocalSyncError::Timeout(d) if d == timeout),
        "unexpected error: {:?}",
        err
    );
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    // Bind then drop to get a port nothing listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = fetcher(addr)
        .fetch(&Request::new("/themes"))
        .await
        .unwrap_err();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_decorated_http_fetch_never_persists_headers() {
    let addr = spawn_server().await;
    let store = Arc::new(CacheStore::new(
        StoreConfig::new().with_driver(StoreDriver::Memory),
    ));
    let handler = SyncHandler::new(store.clone(), fetcher(addr));

    let first = handler.dispatch(Request::new("/themes")).settle().await.unwrap();
    assert!(first.get("_headers").is_none());

    let second = handler.dispatch(Request::new("/themes")).settle().await.unwrap();
    assert_eq!(second, json!({"id": 7, "name": "Twenty Twenty"}));

    let cached = store.read("/themes").await.unwrap().unwrap();
    assert!(cached.get("_headers").is_none());
}
