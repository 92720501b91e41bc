//! Image/text similarity search backend.
//!
//! Glues the vector engine, object store and embedding model into one
//! service: a scheduled pipeline drains uploaded images into the vector
//! collection, and a query service answers text and image queries with
//! public image URLs.

pub mod bootstrap;
pub mod config;

use std::path::PathBuf;

use bytes::Bytes;
use clap::{Parser, Subcommand};
use core_config::{Environment, FromEnv};
use domain_search::{ImageUpload, TickOutcome};
use eyre::{bail, Result, WrapErr};
use tracing::info;

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "search-engine", about = "Image/text similarity search backend")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Provision everything and run the scheduled ingestion loop.
    Serve,
    /// Run exactly one ingestion tick and print its summary.
    Ingest,
    /// One-shot similarity query by text or by image file.
    Search {
        #[arg(long, conflicts_with = "image")]
        text: Option<String>,
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Show provisioning state and pending upload count.
    Status,
}

pub async fn run() -> Result<()> {
    core_config::tracing::install_color_eyre();
    core_config::tracing::init_tracing(&Environment::from_env());

    let cli = Cli::parse();
    let config = AppConfig::from_env().wrap_err("Failed to load configuration")?;
    let engine = bootstrap::bootstrap(&config).await?;

    match cli.command {
        Command::Serve => serve(&engine, &config).await?,
        Command::Ingest => ingest(&engine).await?,
        Command::Search { text, image } => search(&engine, text, image).await?,
        Command::Status => status(&engine).await?,
    }

    engine.shutdown().await;
    Ok(())
}

async fn serve(engine: &bootstrap::Engine, config: &AppConfig) -> Result<()> {
    let mut scheduler = engine
        .pipeline
        .run_scheduled(config.tick_interval)
        .await
        .wrap_err("Failed to start ingestion schedule")?;

    info!("Serving; press ctrl-c to stop");
    tokio::signal::ctrl_c()
        .await
        .wrap_err("Failed to listen for shutdown signal")?;

    info!("Shutdown signal received, stopping schedule");
    if let Err(e) = scheduler.shutdown().await {
        tracing::warn!(error = %e, "Scheduler did not stop cleanly");
    }
    Ok(())
}

async fn ingest(engine: &bootstrap::Engine) -> Result<()> {
    match engine.pipeline.tick().await? {
        TickOutcome::Completed(summary) => println!("{summary}"),
        TickOutcome::Skipped => println!("skipped: another tick is running"),
    }
    Ok(())
}

async fn search(
    engine: &bootstrap::Engine,
    text: Option<String>,
    image: Option<PathBuf>,
) -> Result<()> {
    let matches = match (text, image) {
        (Some(query), None) => engine.query.search_by_text(&query).await?,
        (None, Some(path)) => {
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string)
                .unwrap_or_default();
            let content = tokio::fs::read(&path)
                .await
                .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
            engine
                .query
                .search_by_image(&ImageUpload {
                    file_name,
                    content: Bytes::from(content),
                })
                .await?
        }
        _ => bail!("pass exactly one of --text or --image"),
    };

    if matches.is_empty() {
        println!("no matches");
    }
    for m in matches {
        println!("{}\t{}", m.name, m.locator);
    }
    Ok(())
}

async fn status(engine: &bootstrap::Engine) -> Result<()> {
    let pending = engine
        .landing
        .object_count()
        .await
        .wrap_err("Failed to count pending uploads")?;
    println!("collection: {}", engine.collection.collection());
    println!("state: {:?}", engine.collection.state());
    println!("pending uploads: {pending}");
    Ok(())
}
