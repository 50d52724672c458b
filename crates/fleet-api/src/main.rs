//! Fleet dispatch API server
//!
//! Author: hephaex@gmail.com

use anyhow::Context;
use fleet_api::{create_router, AppState};
use fleet_core::config::{AppConfig, LoggingConfig};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn load_config() -> anyhow::Result<AppConfig> {
    let config = match std::env::var("FLEET_CONFIG") {
        Ok(path) => AppConfig::from_file(&path)
            .with_context(|| format!("failed to load {path}"))?
            .with_env_override()?,
        Err(_) => AppConfig::from_env()?,
    };
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "fleet_api={level},fleet_store={level},fleet_geocode={level},audit=info,tower_http=info",
            level = logging.level
        ))
    });

    if logging.json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    init_tracing(&config.logging);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState::from_config(config)?);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Fleet API server starting on http://{}", addr);
    tracing::info!("OpenAPI document at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
