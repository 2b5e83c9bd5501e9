//! Command definitions and dispatch.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use localsync_core::{CacheStore, HttpFetcher, Request, StoreConfig, StoreDriver, SyncHandler};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "localsync")]
#[command(about = "Stale-while-revalidate cache for JSON REST APIs")]
pub struct Cli {
    /// SQLite database file (defaults to the platform cache directory)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// JSON file with store configuration
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Application namespace
    #[arg(long, global = true)]
    pub namespace: Option<String>,

    /// Sub-store holding the entries
    #[arg(long, global = true)]
    pub store_name: Option<String>,

    /// Use a throwaway in-memory store
    #[arg(long, global = true)]
    pub memory: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch a path through the cache and print the answer
    Get {
        /// Request path, e.g. /sites/example.com/themes
        path: String,

        /// API base URL
        #[arg(long, env = "LOCALSYNC_BASE_URL")]
        base_url: String,

        /// Query parameter as key=value (repeatable)
        #[arg(short, long = "query", value_parser = parse_query_pair)]
        query: Vec<(String, String)>,

        /// Request timeout in seconds
        #[arg(long, default_value = "15")]
        timeout: u64,
    },
    /// Print the cached entry for a key
    Show { key: String },
    /// List cached keys
    Keys,
    /// Remove one cached entry
    Remove { key: String },
    /// Remove every cached entry in the sub-store
    Clear,
    /// Print store metadata
    Info,
}

fn parse_query_pair(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
        _ => Err(format!("expected key=value, got '{}'", s)),
    }
}

/// Build the store configuration: file, then flag overrides.
pub fn store_config(cli: &Cli) -> Result<StoreConfig> {
    let mut config = match &cli.config {
        Some(path) => StoreConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => StoreConfig::default(),
    };

    if let Some(namespace) = &cli.namespace {
        config = config.with_namespace(namespace.clone());
    }
    if let Some(store_name) = &cli.store_name {
        config = config.with_sub_store_name(store_name.clone());
    }
    if let Some(db) = &cli.db {
        config = config.with_path(db.clone());
    }
    if cli.memory {
        config = config.with_driver(StoreDriver::Memory);
    }

    config.validate()?;
    Ok(config)
}

/// Run a command and return what should be printed.
pub async fn run(cli: Cli) -> Result<String> {
    let config = store_config(&cli)?;
    let store = Arc::new(CacheStore::new(config));

    match cli.command {
        Command::Get {
            path,
            base_url,
            query,
            timeout,
        } => {
            let remote = HttpFetcher::with_timeout(&base_url, Duration::from_secs(timeout))?;
            let handler = SyncHandler::new(store, remote);

            let mut request = Request::new(path);
            request.query = query;

            // Settle so the refreshed value is on disk before exiting
            let value = handler.dispatch(request).settle().await?;
            Ok(serde_json::to_string_pretty(&value)?)
        }
        Command::Show { key } => match store.read(&key).await? {
            Some(value) => Ok(serde_json::to_string_pretty(&value)?),
            None => bail!("No cached entry for {}", key),
        },
        Command::Keys => Ok(store.keys().await?.join("\n")),
        Command::Remove { key } => {
            if store.remove(&key).await? {
                Ok(format!("Removed {}", key))
            } else {
                bail!("No cached entry for {}", key)
            }
        }
        Command::Clear => {
            let removed = store.clear().await?;
            Ok(format!("Removed {} entries", removed))
        }
        Command::Info => Ok(serde_json::to_string_pretty(&store.info().await?)?),
    }
}
