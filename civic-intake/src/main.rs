//! civic-intake - Issue submission service
//!
//! Citizens submit civic issue reports here. Each report is validated,
//! enriched with a summary, embedding and tags, screened against stored
//! reports for likely duplicates, then stored.

use anyhow::{Context, Result};
use clap::Parser;
use civic_common::config::{ensure_root_folder, resolve_root_folder, CivicConfig};
use civic_common::db::{init_database, SqliteIssueStore};
use civic_common::generation::{CohereClient, GenerationSettings};
use civic_common::identity::HttpIdentityProvider;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use civic_intake::services::{
    HttpNotifier, LocalBlobStore, LogNotifier, Notifier, PipelineSettings, SubmissionPipeline,
};
use civic_intake::{build_router, AppState};

/// Command-line arguments for civic-intake
#[derive(Parser, Debug)]
#[command(name = "civic-intake")]
#[command(about = "Civic issue submission service")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Folder holding the database and uploaded images
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Port to listen on (overrides [intake] port)
    #[arg(short, long, env = "CIVIC_INTAKE_PORT")]
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

    info!(
        "Starting civic-intake v{} [{}] built {} ({})",
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
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e.into());
        }
    };
    let store = Arc::new(SqliteIssueStore::new(pool));

    let generator = Arc::new(
        CohereClient::new(GenerationSettings {
            base_url: config.generation.base_url.clone(),
            api_key: config.generation_api_key()?,
            summarize_model: config.generation.summarize_model.clone(),
            embed_model: config.generation.embed_model.clone(),
            generate_model: config.generation.generate_model.clone(),
            timeout: Duration::from_secs(config.generation.timeout_secs),
        })
        .context("Failed to build generation client")?,
    );

    let identity = Arc::new(
        HttpIdentityProvider::new(
            config.identity_base_url()?,
            config.identity_api_key()?,
            config.pipeline.call_timeout(),
        )
        .context("Failed to build identity client")?,
    );

    let host = config.intake.host.clone();
    let port = args.port.unwrap_or(config.intake.port);

    let images_dir = root_folder.join(&config.storage.bucket);
    std::fs::create_dir_all(&images_dir)
        .with_context(|| format!("Failed to create image folder {}", images_dir.display()))?;
    let public_base_url = config
        .storage
        .public_base_url
        .clone()
        .unwrap_or_else(|| format!("http://{}:{}/images", host, port));
    let blob_store = Arc::new(LocalBlobStore::new(images_dir.clone(), public_base_url));

    let notifier: Arc<dyn Notifier> = match &config.notification.endpoint {
        Some(endpoint) => Arc::new(
            HttpNotifier::new(endpoint.clone(), config.pipeline.call_timeout())
                .context("Failed to build notification client")?,
        ),
        None => {
            info!("No notification endpoint configured; confirmations will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let settings = PipelineSettings {
        call_timeout: config.pipeline.call_timeout(),
        notification_template: config.notification.template_id.clone(),
    };
    let pipeline = Arc::new(SubmissionPipeline::new(store, generator, blob_store, notifier, settings));

    let state = AppState::new(pipeline, identity, images_dir);
    let app = build_router(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("civic-intake listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
