//! lingo-gen - fills and drains the content generation queue

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lingo_common::config::{CliOverrides, ServiceConfig};
use lingo_common::db::init_database;
use lingo_common::db::models::ContentType;
use lingo_common::storage::FsObjectStore;
use lingo_gen::queue::{self, DEFAULT_CLAIM_SIZE};
use lingo_gen::{fan_out, HttpContentGenerator, Worker, WorkerSettings};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "lingo-gen")]
#[command(about = "Content generation queue for Lingo")]
#[command(version)]
struct Args {
    /// Config file (TOML)
    #[arg(short, long, env = "LINGO_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// SQLite database path
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Enqueue one job per language, CEFR level, subject and content type
    Fill {
        #[arg(long, value_delimiter = ',', default_value = "French")]
        languages: Vec<String>,

        #[arg(long, value_delimiter = ',', default_value = "Politics")]
        subjects: Vec<String>,

        /// News, Story or both
        #[arg(long, value_delimiter = ',', default_value = "News")]
        content_types: Vec<String>,
    },

    /// Process pending jobs until the queue is empty
    Work {
        #[arg(long, default_value_t = DEFAULT_CLAIM_SIZE)]
        batch_size: i64,

        /// Stop after a single batch
        #[arg(long)]
        once: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting lingo-gen v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let config = ServiceConfig::load(&CliOverrides {
        config: args.config,
        database: args.database,
        bind: None,
    })?;

    info!("Database path: {}", config.database_path.display());
    let pool = init_database(&config.database_path)
        .await
        .context("Failed to initialize database")?;

    match args.command {
        Command::Fill {
            languages,
            subjects,
            content_types,
        } => {
            let content_types = content_types
                .iter()
                .map(|t| t.parse::<ContentType>())
                .collect::<lingo_common::Result<Vec<_>>>()?;

            let specs = fan_out(&languages, &subjects, &content_types);
            let enqueued = queue::enqueue(&pool, &specs).await?;
            info!("Enqueued {} generation jobs", enqueued);
        }
        Command::Work { batch_size, once } => {
            let generator =
                HttpContentGenerator::new(&config.generator_base_url, config.generator_api_key.clone())
                    .context("Failed to build generator client")?;
            let store = FsObjectStore::new(config.storage_root.clone());
            info!("Content storage: {}", config.storage_root.display());

            let worker = Worker::new(
                pool.clone(),
                Arc::new(store),
                Arc::new(generator),
                WorkerSettings {
                    claim_size: batch_size,
                    ..WorkerSettings::default()
                },
            );

            let report = if once {
                worker.run_batch().await?
            } else {
                worker.run_until_empty().await?
            };
            info!(
                claimed = report.claimed,
                done = report.done,
                failed = report.failed,
                unrecorded = report.unrecorded,
                "Generation run finished"
            );
        }
    }

    for (status, count) in queue::status_counts(&pool).await? {
        info!(status = %status, count, "Queue status");
    }

    Ok(())
}
