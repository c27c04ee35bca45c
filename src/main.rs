//! Vidya Catalog Server
//!
//! Serves the report catalog and blog discovery over HTTP

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vidya_catalog::server::{run_server, AppState};
use vidya_catalog::{CatalogStore, Config, DevtoClient, DiscoveryPipeline, DiscoverySettings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Vidya Catalog Server");

    let config_path =
        std::env::var("VIDYA_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let config = Config::load_from(&config_path)?;

    let store = Arc::new(
        CatalogStore::new(&config.database.path)
            .with_context(|| format!("Failed to open database {}", config.database.path))?,
    );
    info!("Content store opened at {}", config.database.path);

    let source = Arc::new(DevtoClient::from_config(&config.article_source));
    let pipeline = DiscoveryPipeline::new(source, DiscoverySettings::from_config(&config))
        .with_local(store.clone());
    info!(
        "Article source {} (author {})",
        config.article_source.base_url, config.article_source.curated_author
    );

    let state = Arc::new(AppState {
        store,
        pipeline: Arc::new(pipeline),
        page_size: config.discovery.page_size,
        started_at: Instant::now(),
    });

    run_server(&config.server.host, config.server.port, state).await?;

    Ok(())
}
