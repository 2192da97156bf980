//! objrel-dq - relation listing and data quality service
//!
//! Serves relation listings, data quality scans and bulk remediation for
//! the polymorphic object store over HTTP/JSON.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use objrel_common::config::{config_file_path, resolve_root_folder, TomlConfig, ROOT_FOLDER_ENV};
use objrel_common::db::init::init_database;
use objrel_common::entity_types::default_entity_types;
use objrel_dq::registry::EntityRegistry;
use objrel_dq::{build_router, AppState};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for objrel-dq
#[derive(Parser, Debug)]
#[command(name = "objrel-dq")]
#[command(about = "Relation engine and data quality service for objrel")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "OBJREL_PORT")]
    port: Option<u16>,

    /// Root folder holding objrel.toml and the database
    #[arg(short, long, env = ROOT_FOLDER_ENV)]
    root_folder: Option<PathBuf>,

    /// Config file (defaults to <root folder>/objrel.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), ROOT_FOLDER_ENV);
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_file_path(&root_folder));
    // read before tracing is initialised: the log level comes from the file
    let loaded = TomlConfig::load(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    let config_found = loaded.is_some();
    let config = loaded.unwrap_or_default();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting objrel-dq v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    info!("Root folder: {}", root_folder.display());
    if config_found {
        info!("Loaded configuration from {}", config_path.display());
    } else {
        warn!(
            "Config file not found at {}, using compiled defaults",
            config_path.display()
        );
    }

    let db_path = config.database_path(&root_folder);
    info!("Database path: {}", db_path.display());

    let pool = match init_database(&db_path).await {
        Ok(pool) => {
            info!("✓ Database ready");
            pool
        }
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e).context("Database initialization failed");
        }
    };

    let descriptors = if config.entity_types.is_empty() {
        info!("No [[entity_types]] configured, using built-in entity types");
        default_entity_types()
    } else {
        config.entity_types.clone()
    };

    let registry = EntityRegistry::load(&pool, &descriptors)
        .await
        .context("Failed to build entity registry")?;

    let state = AppState::new(
        pool,
        registry,
        descriptors,
        Duration::from_millis(config.operation_timeout_ms),
    );
    let app = build_router(state);

    let port = args.port.unwrap_or(config.port);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("objrel-dq listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
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
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
