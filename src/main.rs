use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::http::Request;
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};

use outreach_tracker::config::AppConfig;
use outreach_tracker::logging::init_logging;
use outreach_tracker::notify::build_notifier;
use outreach_tracker::store::open_store;
use outreach_tracker::{router, AppState, TrackingService};

/// Email open tracking and contact intake server.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Extra configuration file layered above config/default and config/local
    #[arg(short, long, env = "OUTREACH_CONFIG")]
    config: Option<PathBuf>,

    /// Path to .env file (optional)
    #[arg(long, env = "DOTENV_PATH", default_value = ".env")]
    dotenv: PathBuf,

    /// Do not create the schema at startup
    #[arg(long)]
    skip_setup: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load .env file if it exists
    if cli.dotenv.exists() {
        dotenvy::from_path(&cli.dotenv)
            .with_context(|| format!("Failed to load {}", cli.dotenv.display()))?;
    }

    // Load configuration
    let config = AppConfig::load_from(cli.config.as_deref())?;

    // Initialize logging; the guard flushes the file writer on exit
    let _log_guard = init_logging(&config.logging)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting outreach-tracker");

    let store = open_store(&config.database)?;

    let notifier = build_notifier(&config.notification)?;
    let service = TrackingService::new(
        store,
        notifier,
        Duration::from_secs(config.notification.timeout_secs),
    );

    if cli.skip_setup {
        info!("schema setup skipped");
    } else if let Err(err) = service.setup().await {
        // The store may come up later; /setup-db can be called then.
        warn!(error = %err, "schema setup failed at startup");
    }

    let bind_addr = config.bind_addr();
    let state = AppState::new(config, service);

    // Build router with middleware
    let app = router(state)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                tracing::span!(
                    Level::INFO,
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path()
                )
            }),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {bind_addr}"))?;
    info!(addr = %bind_addr, "starting server");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
