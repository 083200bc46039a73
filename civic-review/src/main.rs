//! civic-review - Authority review service
//!
//! Authorities list submitted issues, read AI summaries and suggested
//! replies, and assign priority or category.

use anyhow::{Context, Result};
use clap::Parser;
use civic_common::config::{ensure_root_folder, resolve_root_folder, CivicConfig};
use civic_common::db::{init_database, SqliteIssueStore};
use civic_common::generation::{CohereClient, GenerationSettings};
use civic_common::identity::HttpIdentityProvider;
use civic_review::{build_router, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Command-line arguments for civic-review
#[derive(Parser, Debug)]
#[command(name = "civic-review")]
#[command(about = "Civic issue review service for authorities")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Folder holding the issue database
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Port to listen on (overrides [review] port)
    #[arg(short, long, env = "CIVIC_REVIEW_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let (config, config_source) =
        CivicConfig::load_with_source(args.config.as_deref()).context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    // Build identification first, before any slow startup step
    info!(
        "Starting civic-review v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    config_source.log();

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &config);
    let db_path = ensure_root_folder(&root_folder)?;
    info!("Database path: {}", db_path.display());

    let pool = match init_database(&db_path).await {
        Ok(pool) => {
            info!("✓ Connected to database");
            pool
        }
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            return Err(e.into());
        }
    };

    let generator = CohereClient::new(GenerationSettings {
        base_url: config.generation.base_url.clone(),
        api_key: config.generation_api_key()?,
        summarize_model: config.generation.summarize_model.clone(),
        embed_model: config.generation.embed_model.clone(),
        generate_model: config.generation.generate_model.clone(),
        timeout: Duration::from_secs(config.generation.timeout_secs),
    })
    .context("Failed to build generation client")?;

    let identity = HttpIdentityProvider::new(
        config.identity_base_url()?,
        config.identity_api_key()?,
        config.pipeline.call_timeout(),
    )
    .context("Failed to build identity client")?;

    let state = AppState::new(
        Arc::new(SqliteIssueStore::new(pool)),
        Arc::new(identity),
        Arc::new(generator),
    )
    .with_page_size(config.review.page_size)
    .with_call_timeout(config.pipeline.call_timeout());
    let app = build_router(state);

    let addr = format!("{}:{}", config.review.host, args.port.unwrap_or(config.review.port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("civic-review listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
