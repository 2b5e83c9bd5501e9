//! Fetch a path twice through a cached handler.
//!
//! The first run of this example waits for the network. Run it again and the
//! first answer comes from the on-disk cache while the remote refreshes it.
//!
//! Usage:
//!   cargo run --package localsync-core --example themes_cache -- \
//!       https://public-api.wordpress.com/rest/v1.1 /themes

use localsync_core::{CacheStore, HttpFetcher, Request, StoreConfig, SyncHandler};
use std::sync::Arc;
use std::time::Instant;

#[tokio::main]
async fn main() -> localsync_core::Result<()> {
    let mut args = std::env::args().skip(1);
    let base_url = args
        .next()
        .unwrap_or_else(|| "https://public-api.wordpress.com/rest/v1.1".to_string());
    let path = args.next().unwrap_or_else(|| "/themes".to_string());

    let config = StoreConfig::new().with_namespace("themes-example");
    println!("Cache database: {}", config.resolve_db_path()?.display());

    let store = Arc::new(CacheStore::new(config));
    let handler = SyncHandler::new(store.clone(), HttpFetcher::new(&base_url)?);

    let started = Instant::now();
    let call = handler.dispatch(Request::new(path.clone()));
    let value = call.response.await?;
    println!(
        "Answered {} in {:?} ({} bytes)",
        path,
        started.elapsed(),
        value.to_string().len()
    );

    // Let the refresh land before exiting
    if call.revalidation.await.is_err() {
        eprintln!("Revalidation task failed");
    }
    println!("Cached keys: {:?}", store.keys().await?);

    Ok(())
}
