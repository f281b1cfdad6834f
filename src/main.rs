//! # Mockup Rendering Service
//!
//! An Axum web service that renders product mockups. `POST /mockup` takes a
//! base photo, a design and the four photo-space corners the design should
//! land on, and answers with the URL of the rendered PNG under `/results/`.
//! A `/health` endpoint is also available for health checks.
//!
//! ## Configuration
//!
//! The service can be configured using environment variables:
//! - `RUST_LOG`: Sets the logging level (e.g., `info`, `debug`, `mockup_renderer=trace`). Defaults to `info`.
//! - `MOCKUP_HOST`: The host address to bind to. Defaults to `0.0.0.0`.
//! - `MOCKUP_PORT`: The port to bind to. Defaults to `3000`.
//! - `MOCKUP_RESULTS_DIR`: Directory rendered mockups are written to. Defaults to `results`.
//! - `MOCKUP_MAX_UPLOAD_BYTES`: Request body limit. Defaults to 25 MiB.

use anyhow::Context;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mockup_renderer::config::ServerConfig;
use mockup_renderer::routes::{app, AppState};
use mockup_renderer::store::FsArtifactStore;

/// Initializes logging, opens the results directory, and serves until
/// SIGINT (Ctrl+C) or SIGTERM (on Unix) triggers a graceful shutdown.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Example: `RUST_LOG=mockup_renderer=debug,tower_http=debug cargo run`
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Initializing server {} v{}...", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::from_env()?;
    debug!(?config, "Loaded configuration");

    let store = FsArtifactStore::open(&config.results_dir).context(format!(
        "Failed to open results directory {}",
        config.results_dir.display()
    ))?;
    let app = app(AppState::new(store), config.max_upload_bytes);

    let bind_addr = config.bind_addr();
    debug!("Attempting to bind to {}", bind_addr);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .context(format!("Failed to bind to address {}", bind_addr))?;
    let addr = listener.local_addr()?;
    info!(
        name = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION"),
        address = %addr,
        results_dir = %config.results_dir.display(),
        "Server listening"
    );

    let shutdown_signal = async {
        let ctrl_c = async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("Failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>(); // On non-Unix platforms, only Ctrl+C is monitored.

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }

        info!("Shutdown signal received, starting graceful shutdown...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Axum server error")?;

    info!("Server shut down gracefully.");
    Ok(())
}
