//! civmap-ingest - village address resolution and record enrichment
//!
//! Subcommands:
//! - `enrich`: run the configured source files through the enrichment
//!   pipeline into the base record tree
//! - `serve`: HTTP API for merged records, live edits and address resolution
//! - `townships`: print township aggregates as JSON

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use civmap_common::config::{load_config, DataPaths, RootFolderResolver, TomlConfig};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use civmap_ingest::db::{init_database_pool, BaseRecordStore};
use civmap_ingest::services::boundary_aggregator::aggregate_townships;
use civmap_ingest::services::{
    AddressCache, BoundarySet, GeocodingClient, LadderConfig, VillageResolver,
};
use civmap_ingest::workflow::EnrichmentPipeline;
use civmap_ingest::AppState;

/// Command-line arguments for civmap-ingest
#[derive(Parser, Debug)]
#[command(name = "civmap-ingest")]
#[command(about = "Village address resolution and community record enrichment")]
#[command(version)]
struct Args {
    /// Configuration file (default: discovered civmap config)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Root folder that relative data paths resolve against
    #[arg(short, long, global = true)]
    root_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Enrich village records from the configured source files
    Enrich,
    /// Serve the HTTP API
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long, env = "CIVMAP_PORT")]
        port: Option<u16>,
    },
    /// Print township hulls and labels as JSON
    Townships,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    civmap_common::logging::init_tracing(&config.logging)
        .context("Failed to initialize logging")?;

    let root_folder = RootFolderResolver::new(args.root_folder.clone()).resolve(&config);
    let paths = config.data_paths(&root_folder);

    info!("Starting civmap-ingest {}", env!("CARGO_PKG_VERSION"));
    info!("Root folder: {}", root_folder.display());

    match args.command {
        Command::Enrich => run_enrich(&config, &paths, &root_folder).await,
        Command::Serve { port } => run_serve(&config, &paths, port).await,
        Command::Townships => run_townships(&paths),
    }
}

fn load_boundaries(paths: &DataPaths) -> Result<Arc<BoundarySet>> {
    let boundaries = BoundarySet::load(&paths.boundaries).with_context(|| {
        format!("Failed to load boundaries from {}", paths.boundaries.display())
    })?;
    if boundaries.is_empty() {
        warn!("Boundary set is empty; geocoded addresses will not match any village");
    }
    Ok(Arc::new(boundaries))
}

/// County names as written in the dataset, plus their `台` spellings
fn county_prefixes(boundaries: &BoundarySet) -> Vec<String> {
    let mut prefixes = Vec::new();
    for county in boundaries.counties() {
        if county.contains('臺') {
            prefixes.push(county.replace('臺', "台"));
        }
        prefixes.push(county);
    }
    prefixes
}

fn build_resolver(config: &TomlConfig, paths: &DataPaths) -> Result<VillageResolver> {
    let boundaries = load_boundaries(paths)?;
    let cache = AddressCache::load(&paths.cache_file);
    let ladder = LadderConfig::new(county_prefixes(&boundaries));

    let geocoder = GeocodingClient::from_config(&config.geocoder, cache, ladder)
        .context("Failed to build geocoding client")?;

    Ok(VillageResolver::new(Arc::new(geocoder), boundaries))
}

async fn run_enrich(config: &TomlConfig, paths: &DataPaths, root_folder: &std::path::Path) -> Result<()> {
    let sources = config.resolved_sources(root_folder);
    if sources.is_empty() {
        warn!("No [[sources]] configured; nothing to enrich");
        return Ok(());
    }

    let resolver = build_resolver(config, paths)?;
    let store = BaseRecordStore::new(&paths.base_records);
    info!("Base records: {}", store.root().display());

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Cancelling after the current row");
        on_signal.cancel();
    });

    let pipeline = EnrichmentPipeline::new(store, resolver, cancel);
    let stats = pipeline.run(&sources).await;

    info!("Done! {}", stats);
    Ok(())
}

async fn run_serve(config: &TomlConfig, paths: &DataPaths, port: Option<u16>) -> Result<()> {
    let resolver = build_resolver(config, paths)?;
    let store = BaseRecordStore::new(&paths.base_records);

    info!("Database: {}", paths.database.display());
    let db_pool = init_database_pool(&paths.database)
        .await
        .context("Failed to open database")?;

    let state = AppState::new(db_pool, store, resolver);
    let app = civmap_ingest::build_router(state);

    let addr = format!("{}:{}", config.server.host, port.unwrap_or(config.server.port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

fn run_townships(paths: &DataPaths) -> Result<()> {
    let boundaries = load_boundaries(paths)?;
    let townships = aggregate_townships(&boundaries);
    info!("Aggregated {} townships", townships.len());

    println!("{}", serde_json::to_string_pretty(&townships)?);
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
