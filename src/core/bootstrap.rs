//! Wiring shared by the binaries.

use crate::config::AppConfig;
use crate::core::pipeline::{BatchRunner, PipelineContext, SymbolPipeline};
use crate::core::scheduler::{cron_for_interval, parse_schedule};
use crate::db::{PostgresRepository, Repository};
use crate::error::{ConfigError, ProviderError, RepositoryError};
use crate::indicators::TaCalculator;
use crate::metrics::Metrics;
use crate::services::{MarketDataProvider, YahooChartProvider};
use crate::signals::SignalEngine;
use cron::Schedule;
use std::sync::Arc;
use tracing::{error, info};

pub async fn connect_repository(
    config: &AppConfig,
    metrics: &Metrics,
) -> Result<Arc<PostgresRepository>, RepositoryError> {
    info!(pool_size = config.db_pool_size, "connecting to postgres...");
    match PostgresRepository::connect(&config.database_url, config.db_pool_size, config.pipeline.interval).await {
        Ok(repo) => {
            metrics.database_connected.set(1.0);
            Ok(Arc::new(repo))
        }
        Err(e) => {
            metrics.database_connected.set(0.0);
            error!(error = %e, "failed to connect to postgres");
            Err(e)
        }
    }
}

pub fn build_provider(config: &AppConfig) -> Result<Arc<dyn MarketDataProvider>, ProviderError> {
    let provider = match &config.provider_base_url {
        Some(url) => {
            info!(base_url = %url, "using provider base url override");
            YahooChartProvider::with_base_url(url.clone())?
        }
        None => YahooChartProvider::new()?,
    };
    Ok(Arc::new(provider))
}

pub fn build_runner(
    config: &AppConfig,
    provider: Arc<dyn MarketDataProvider>,
    repository: Arc<dyn Repository>,
    metrics: Arc<Metrics>,
) -> Arc<BatchRunner> {
    let ctx = Arc::new(PipelineContext {
        provider,
        repository,
        calculator: Arc::new(TaCalculator::default()),
        engine: Arc::new(SignalEngine::standard(config.weights.clone())),
        metrics: Some(metrics.clone()),
    });
    let pipeline = Arc::new(SymbolPipeline::new(ctx, config.pipeline.clone()));
    Arc::new(BatchRunner::new(pipeline, config.concurrency, config.symbol_timeout).with_metrics(metrics))
}

/// `SYNC_CRON` wins over `SYNC_INTERVAL_SECONDS`. `None` when neither is set.
pub fn schedule_from_config(config: &AppConfig) -> Result<Option<Schedule>, ConfigError> {
    if let Some(expr) = &config.sync_cron {
        return parse_schedule(expr).map(Some);
    }
    if config.sync_interval_seconds == 0 {
        return Ok(None);
    }
    let expr = cron_for_interval(config.sync_interval_seconds)?;
    parse_schedule(&expr).map(Some)
}
