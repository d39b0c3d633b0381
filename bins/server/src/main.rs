//! Blink file gateway server.
//!
//! Main entry point: loads configuration, prepares the database and the
//! bucket, then serves the HTTP API.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use blink_api::{AppState, create_router};
use blink_core::file::FileService;
use blink_core::storage::{Provisioner, StorageConfig, StorageService, ensure_bucket};
use blink_db::FileMetadataRepository;
use blink_shared::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(config.server.log_json);

    // Connect to database
    let db = blink_db::connect(&config.database)
        .await
        .context("Failed to connect to database")?;
    if config.database.auto_migrate {
        blink_db::migrate(&db)
            .await
            .context("Failed to run migrations")?;
        info!("Migrations applied");
    }

    // Make sure the bucket exists before accepting traffic
    let storage_config = StorageConfig::from_settings(&config.storage);
    let status = ensure_bucket(&Provisioner::for_config(&storage_config))
        .await
        .context("Failed to prepare storage bucket")?;
    info!(
        provider = storage_config.provider.name(),
        bucket = storage_config.provider.bucket(),
        ?status,
        "Storage ready"
    );

    let share_link_ttl = storage_config.share_link_ttl();
    let max_file_size = storage_config.max_file_size;
    let storage = StorageService::from_config(storage_config)
        .context("Failed to initialize storage")?;
    let files = FileService::new(
        Arc::new(storage),
        Arc::new(FileMetadataRepository::new(db)),
    );

    let state = AppState {
        files: Arc::new(files),
        share_link_ttl,
        max_file_size,
    };
    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "blink=debug,tower_http=debug".into());

    let (json_layer, text_layer) = if json {
        (Some(fmt::layer().json()), None)
    } else {
        (None, Some(fmt::layer()))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}

/// Which signal ended the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shutdown {
    Interrupt,
    Terminate,
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM, then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let signal = first_signal(ctrl_c, terminate).await;
    info!(?signal, "Shutdown signal received, draining connections");
}

async fn first_signal(
    interrupt: impl Future<Output = ()>,
    terminate: impl Future<Output = ()>,
) -> Shutdown {
    tokio::select! {
        () = interrupt => Shutdown::Interrupt,
        () = terminate => Shutdown::Terminate,
    }
}
