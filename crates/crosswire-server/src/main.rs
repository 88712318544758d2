//! crosswire server
//!
//! HTTP front end for the crosswire protocol bridge: accepts
//! Messages-dialect requests, relays them to a stream-only Responses
//! upstream, and transcodes the answers back.

mod config;
mod error;
mod relay;
mod scheduler;
mod server;
mod sink;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crosswire_bridge::upstream::UpstreamClient;

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::relay::AppState;
use crate::scheduler::StaticScheduler;
use crate::sink::InMemorySink;

/// Config path from `CROSSWIRE_CONFIG`, the first CLI argument, or the
/// default file name.
fn config_path() -> PathBuf {
    std::env::var_os("CROSSWIRE_CONFIG")
        .map(PathBuf::from)
        .or_else(|| std::env::args_os().nth(1).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("crosswire.toml"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let path = config_path();
    let config = match ServerConfig::load(&path) {
        Ok(config) => Arc::new(config),
        Err(load_error) => {
            error!("failed to load configuration from {}: {load_error}", path.display());
            return Err(load_error);
        }
    };
    info!(
        accounts = config.accounts.len(),
        upstream = %config.upstream_base_url,
        "configuration loaded"
    );

    let upstream = UpstreamClient::new(
        config.upstream_base_url.clone(),
        Duration::from_secs(config.timeout_seconds),
    )
    .map_err(|client_error| ServerError::Config(client_error.to_string()))?;

    let state = Arc::new(AppState {
        config: Arc::clone(&config),
        upstream,
        scheduler: Arc::new(StaticScheduler::new(&config.accounts)),
        sink: Arc::new(InMemorySink::new()),
    });

    let listener = TcpListener::bind(&config.listen_addr).await?;
    let app = relay::router(state);

    tokio::select! {
        served = server::serve(listener, app) => served?,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("shutdown signal received");
        }
    }

    Ok(())
}
