//! lingo-api - language learning platform HTTP service
//!
//! Serves decks, classrooms, organizations, billing and generated reading
//! content over a JSON API.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use lingo_common::config::{CliOverrides, ServiceConfig};
use lingo_common::db::init_database;
use lingo_common::storage::FsObjectStore;
use lingo_api::services::{HttpPaymentProvider, HttpSpeechService};
use lingo_api::{build_router, AppState};
use tracing::info;

/// Command-line arguments for lingo-api
#[derive(Parser, Debug)]
#[command(name = "lingo-api")]
#[command(about = "Language learning platform API")]
#[command(version)]
struct Args {
    /// Config file (TOML)
    #[arg(short, long, env = "LINGO_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database path
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Address to listen on, e.g. 127.0.0.1:8080
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting lingo-api v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let config = ServiceConfig::load(&CliOverrides {
        config: args.config,
        database: args.database,
        bind: args.bind,
    })?;

    info!("Database path: {}", config.database_path.display());
    let pool = init_database(&config.database_path)
        .await
        .context("Failed to initialize database")?;

    let payments = HttpPaymentProvider::new(
        &config.payments.base_url,
        config.payments.api_key.clone(),
    )
    .context("Failed to build payment provider client")?;
    let speech = HttpSpeechService::new(&config.speech_base_url, config.speech_api_key.clone())
        .context("Failed to build speech service client")?;

    info!("Content storage: {}", config.storage_root.display());
    let store = FsObjectStore::new(config.storage_root.clone());

    if config.webhook_secret.is_none() {
        info!("No webhook secret configured; payment webhooks will be refused");
    }

    let state = AppState::new(
        pool,
        &config,
        Arc::new(payments),
        Arc::new(speech),
        Arc::new(store),
    )?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("lingo-api listening on http://{}", config.bind_addr);
    info!("Health check: http://{}/health", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
