use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use yarr_core::{load_config, validate_config, ProviderHealthMonitor, StreamResolver};
use yarr_server::api::create_router;
use yarr_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("YARR_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        version = VERSION,
        config_hash = &config_hash[..16],
        "Configuration loaded successfully"
    );

    // Build the resolution pipeline
    let health = Arc::new(ProviderHealthMonitor::new(config.health.clone()));
    let resolver = Arc::new(
        StreamResolver::from_config(&config, Arc::clone(&health))
            .context("Failed to build stream resolver")?,
    );

    let adapters = resolver.registry().names();
    if adapters.is_empty() {
        warn!("No source adapters configured; stream requests will be rejected");
    } else {
        info!(adapters = ?adapters, "Source adapters registered");
    }
    let services = resolver.debrid().service_names();
    if services.is_empty() {
        info!("No acceleration services configured");
    } else {
        info!(services = ?services, "Acceleration services configured");
    }
    info!(
        timeout_ms = resolver.settings().search_timeout.as_millis() as u64,
        cache_ttl_secs = resolver.settings().cache_ttl.as_secs(),
        "Search settings"
    );

    // Background maintenance; both end once their owner is dropped
    let health_sweeper = health.spawn_sweeper();
    let cache_sweeper = resolver
        .cache()
        .spawn_sweeper(Duration::from_secs(config.cache.sweep_interval_secs.max(1)));
    info!("Background sweepers started");

    // Create app state
    let state = Arc::new(AppState::new(config.clone(), Arc::clone(&resolver)));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    health_sweeper.abort();
    cache_sweeper.abort();
    info!(
        in_flight = resolver.in_flight(),
        "Background sweepers stopped"
    );

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
