//! zap-relay binary entry point.
//!
//! Usage:
//! ```bash
//! zap-relay --config zapsters.toml
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use zap_relay::config::Config;
use zap_relay::server::ZapRelay;
use zap_relay::storage::SqliteStorage;
use zap_relay::{http, settings};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config_path = get_config_path();
    let config = if config_path.exists() {
        Config::from_file(&config_path)?
    } else {
        tracing::warn!("config file {} not found, using defaults", config_path.display());
        Config::default()
    };

    let storage = SqliteStorage::new(&config.storage.database).await?;
    settings::seed_settings(&storage, &config.relay).await?;
    http::health::init_start_time();

    let bind_address = config.server.bind_address.clone();
    let relay = Arc::new(ZapRelay::new(config, storage)?);
    let router = http::build_router(relay);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!(
        "zap-relay v{} listening on {}",
        env!("CARGO_PKG_VERSION"),
        bind_address
    );
    axum::serve(listener, router).await?;

    Ok(())
}

fn get_config_path() -> PathBuf {
    std::env::args()
        .skip_while(|arg| arg != "--config")
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("zapsters.toml"))
}
