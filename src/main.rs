use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::fs;
use tracing::{info, Level};

use filehub::config::AppConfig;
use filehub::file_operations::store::{LocalStore, ObjectStore};
use filehub::{app, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    info!("Starting filehub server...");

    let config = AppConfig::from_env().context("invalid configuration")?;

    fs::create_dir_all(&config.storage_root)
        .await
        .context("Failed to create storage root directory")?;
    let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(config.storage_root.clone()));

    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState { config, store });

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind TCP listener")?;

    info!("Listening on http://{}", addr);

    axum::serve(listener, app(state))
        .await
        .context("Axum server failed")?;
    Ok(())
}
