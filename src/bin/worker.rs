//! Stocksignal Worker
//!
//! Runs the sync batch on a cron schedule and serves the HTTP API next to it,
//! so `/api/batches/latest` reflects the most recent run.

use chrono::Utc;
use dotenvy::dotenv;
use stocksignal::config::AppConfig;
use stocksignal::core::bootstrap::{build_provider, build_runner, connect_repository, schedule_from_config};
use stocksignal::core::http::{start_server, AppState};
use stocksignal::core::scheduler::JobScheduler;
use stocksignal::db::Repository;
use stocksignal::logging;
use stocksignal::metrics::Metrics;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    logging::init_logging();

    let config = AppConfig::from_env()?;
    info!("Starting Stocksignal Worker");
    info!(environment = %config.environment, "Environment");

    let schedule = schedule_from_config(&config)?
        .ok_or("SYNC_CRON or SYNC_INTERVAL_SECONDS must be set for worker")?;
    if config.symbols.is_empty() {
        warn!("No symbols configured - scheduled batches will be empty");
    } else {
        info!(symbols = ?config.symbols, "Symbols: {}", config.symbols.join(", "));
    }

    let metrics = Arc::new(Metrics::new()?);
    let repository = connect_repository(&config, &metrics).await?;
    let provider = build_provider(&config)?;
    let runner = build_runner(&config, provider, repository.clone(), metrics.clone());

    let repository: Arc<dyn Repository> = repository;
    let state = AppState::new(metrics, Some(repository));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Run once at startup so the API has something to show before the first tick.
    let initial = runner.run(&config.symbols, Utc::now(), shutdown_rx.clone()).await;
    *state.latest_batch.write().await = Some(initial);

    let scheduler = JobScheduler::new(
        runner,
        config.symbols.clone(),
        schedule,
        state.latest_batch.clone(),
        shutdown_rx,
    );
    scheduler.start().await;

    let port = config.port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(state, port).await {
            error!(error = %e, "HTTP server error");
        }
    });

    info!("Worker started, waiting for shutdown signal...");
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Shutting down worker...");
            let _ = shutdown_tx.send(true);
            scheduler.stop().await;
            info!("Worker stopped");
        }
        _ = server_handle => {
            error!("HTTP server stopped");
            let _ = shutdown_tx.send(true);
            scheduler.stop().await;
        }
    }

    Ok(())
}
