//! Stocksignal one-shot sync
//!
//! Runs a single batch over the configured symbols and logs the batch summary.
//! Usage: `sync [--mode sync|expand_history|indicators_only] [--force] [SYMBOL...]`.
//! Symbols given on the command line replace `SYMBOLS`.

use chrono::Utc;
use dotenvy::dotenv;
use stocksignal::config::{parse_symbols, AppConfig, RunMode};
use stocksignal::core::bootstrap::{build_provider, build_runner, connect_repository};
use stocksignal::logging;
use stocksignal::metrics::Metrics;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

struct Args {
    mode: Option<RunMode>,
    force: bool,
    symbols: Vec<String>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        mode: None,
        force: false,
        symbols: Vec::new(),
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--mode" => {
                let value = iter.next().ok_or("--mode needs a value")?;
                args.mode = Some(value.parse()?);
            }
            "--force" => args.force = true,
            other if other.starts_with("--") => return Err(format!("unknown flag {}", other)),
            other => args.symbols.extend(parse_symbols(other)),
        }
    }
    Ok(args)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    logging::init_logging();

    let args = parse_args()?;
    let mut config = AppConfig::from_env()?;
    if let Some(mode) = args.mode {
        config.pipeline.mode = mode;
    }
    config.pipeline.force_recompute |= args.force;
    if !args.symbols.is_empty() {
        config.symbols = args.symbols;
    }

    info!("Starting Stocksignal sync");
    info!(environment = %config.environment, "Environment");
    info!(
        mode = ?config.pipeline.mode,
        market = ?config.pipeline.market,
        interval = %config.pipeline.interval,
        symbols = ?config.symbols,
        "syncing {} symbols",
        config.symbols.len()
    );
    if config.symbols.is_empty() {
        warn!("no symbols configured, nothing to do");
        return Ok(());
    }

    let metrics = Arc::new(Metrics::new()?);
    let repository = connect_repository(&config, &metrics).await?;
    let provider = build_provider(&config)?;
    let runner = build_runner(&config, provider, repository, metrics);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling unfinished symbols...");
            let _ = shutdown_tx.send(true);
        }
    });

    let summary = runner.run(&config.symbols, Utc::now(), shutdown_rx).await;
    for report in summary.reports.iter().filter(|r| r.error.is_some()) {
        error!(
            symbol = %report.symbol,
            error = report.error.as_deref().unwrap_or_default(),
            "symbol failed"
        );
    }
    info!(
        succeeded = summary.succeeded,
        failed = summary.failed,
        inserted = summary.inserted,
        updated = summary.updated,
        "sync finished"
    );
    Ok(())
}
