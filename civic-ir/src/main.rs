//! civic-ir (Issue Reporting) - citizen issue reports and admin analytics
//!
//! Startup order: tracing, build identification, configuration, root folder
//! and database, token secret, classifier client, HTTP server.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use civic_common::api::load_shared_secret;
use civic_common::config::RootFolderInitializer;
use civic_ir::config::{Args, ServiceConfig};
use civic_ir::services::{HttpClassifier, ImageStore};
use civic_ir::{build_router, AppState};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "civic_ir=info,civic_common=info,tower_http=info";

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG wins; otherwise the TOML level is applied once config is read
    let env_filter = EnvFilter::try_from_default_env().ok();
    let from_env = env_filter.is_some();
    let (filter, filter_handle) =
        reload::Layer::new(env_filter.unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER)));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Log build identification before any slow startup work
    info!(
        "Starting Civic Issue Reporting (civic-ir) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();
    let config = ServiceConfig::load(&args).context("Failed to load configuration")?;

    if !from_env {
        let directives = format!("civic_ir={0},civic_common={0},tower_http={0}", config.log_level);
        match EnvFilter::try_new(&directives) {
            Ok(filter) => {
                if let Err(e) = filter_handle.reload(filter) {
                    error!("Failed to apply log level '{}': {}", config.log_level, e);
                }
            }
            Err(e) => error!("Invalid log level '{}': {}", config.log_level, e),
        }
    }

    let initializer = RootFolderInitializer::new(config.root_folder.clone());
    initializer
        .ensure_directory_exists()
        .context("Failed to create root folder")?;
    info!("Root folder: {}", initializer.root_folder().display());

    let db_path = initializer.database_path();
    info!("Database path: {}", db_path.display());

    let pool = match civic_common::db::init_database(&db_path).await {
        Ok(pool) => {
            info!("✓ Database ready");
            pool
        }
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e.into());
        }
    };

    let shared_secret = load_shared_secret(&pool)
        .await
        .context("Failed to load API token secret")?;
    info!("✓ Loaded API token secret");

    let classifier = HttpClassifier::new(config.classifier_url.clone(), config.classifier_timeout)
        .context("Failed to build classifier client")?;
    info!(
        "Classifier: {} (timeout {:?})",
        classifier.url(),
        config.classifier_timeout
    );

    let images = ImageStore::new(initializer.uploads_path(), config.max_upload_bytes);

    let state = AppState::new(
        pool,
        shared_secret,
        Arc::new(classifier),
        config.classifier_timeout,
        images,
    );
    let app = build_router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("civic-ir listening on http://{}", addr);
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
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
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
