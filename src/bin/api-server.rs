//! Stocksignal API Server
//!
//! Read-only HTTP API over stored composite signals. Stateless apart from the
//! database, so it can be scaled horizontally next to a single worker.

use dotenvy::dotenv;
use stocksignal::config::AppConfig;
use stocksignal::core::bootstrap::connect_repository;
use stocksignal::core::http::{start_server, AppState};
use stocksignal::db::Repository;
use stocksignal::logging;
use stocksignal::metrics::Metrics;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    logging::init_logging();

    let config = AppConfig::from_env()?;
    info!("Starting Stocksignal API Server");
    info!(environment = %config.environment, "Environment");
    info!(port = config.port, "HTTP Server: http://0.0.0.0:{}", config.port);

    let metrics = Arc::new(Metrics::new()?);
    let repository: Option<Arc<dyn Repository>> = match connect_repository(&config, &metrics).await {
        Ok(repo) => Some(repo as Arc<dyn Repository>),
        Err(e) => {
            warn!(error = %e, "Database unavailable - /api/signals will answer 503");
            None
        }
    };

    let state = AppState::new(metrics, repository);
    let port = config.port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(state, port).await {
            error!(error = %e, "HTTP server error");
        }
    });

    info!("API server started, waiting for shutdown signal...");
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Shutting down API server...");
        }
        _ = server_handle => {
            error!("HTTP server stopped");
        }
    }

    Ok(())
}
