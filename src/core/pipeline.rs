//! Per-symbol pipeline and the batch runner that fans it out.
//!
//! Stages for one symbol run strictly in order:
//! fetch -> reconcile -> apply -> compute -> extract + fuse -> persist.
//! Symbols share nothing but the repository.

use crate::config::{PipelineConfig, RunMode};
use crate::db::Repository;
use crate::error::{PipelineError, PipelineWarning};
use crate::indicators::IndicatorCalculator;
use crate::metrics::Metrics;
use crate::models::{CompositeSignal, UpdatePlan};
use crate::reconcile::{backfill, plan_window_start, trailing_slice, validate_window, WindowReconciler};
use crate::services::{fetch_symbol, FetchRange, MarketDataProvider, RetryPolicy};
use crate::signals::SignalEngine;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};

/// Collaborators shared by every symbol's pipeline.
pub struct PipelineContext {
    pub provider: Arc<dyn MarketDataProvider>,
    pub repository: Arc<dyn Repository>,
    pub calculator: Arc<dyn IndicatorCalculator>,
    pub engine: Arc<SignalEngine>,
    pub metrics: Option<Arc<Metrics>>,
}

/// What one successful symbol run did.
#[derive(Debug, Clone, Default)]
pub struct SymbolOutcome {
    pub ticker: Option<String>,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub indicator_count: usize,
    pub composite_count: usize,
    pub latest_signal: Option<CompositeSignal>,
    pub warnings: Vec<PipelineWarning>,
}

enum CompositeCoverage {
    Current(Option<CompositeSignal>),
    Behind(DateTime<Utc>),
    Missing,
}

pub struct SymbolPipeline {
    ctx: Arc<PipelineContext>,
    config: PipelineConfig,
}

impl SymbolPipeline {
    pub fn new(ctx: Arc<PipelineContext>, config: PipelineConfig) -> Self {
        Self { ctx, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.config.provider_max_retries,
            min_delay: self.config.retry_min_delay,
            ..RetryPolicy::default()
        }
    }

    /// Run every stage for `symbol` as of `as_of`.
    pub async fn run(&self, symbol: &str, as_of: DateTime<Utc>) -> Result<SymbolOutcome, PipelineError> {
        let cfg = &self.config;
        let mut outcome = SymbolOutcome::default();

        let plan = match cfg.mode {
            RunMode::IndicatorsOnly => {
                let mut plan = UpdatePlan::empty(symbol);
                plan.window_start = Some(as_of - ChronoDuration::days(cfg.lookback_days));
                plan.window_end = Some(as_of);
                plan
            }
            RunMode::Sync | RunMode::ExpandHistory => self.sync_bars(symbol, as_of, &mut outcome).await?,
        };

        let recompute = !plan.is_empty() || cfg.force_recompute || cfg.mode == RunMode::IndicatorsOnly;
        let from = if recompute {
            Some(
                plan.window_start
                    .unwrap_or_else(|| as_of - ChronoDuration::days(cfg.lookback_days)),
            )
        } else {
            match self.composite_coverage(symbol).await? {
                CompositeCoverage::Current(latest) => {
                    debug!(symbol = %symbol, "no bar changes for {}, skipping recompute", symbol);
                    outcome.latest_signal = latest;
                    return Ok(outcome);
                }
                CompositeCoverage::Behind(last) => {
                    warn!(
                        symbol = %symbol,
                        last_composite = %last,
                        "composites for {} lag stored bars, recomputing the gap",
                        symbol
                    );
                    Some(last + ChronoDuration::seconds(1))
                }
                CompositeCoverage::Missing => {
                    warn!(symbol = %symbol, "no composites stored for {}, recomputing", symbol);
                    None
                }
            }
        };

        let bars = self
            .ctx
            .repository
            .read_latest(symbol, cfg.indicator_history_bars)
            .await?;
        if bars.is_empty() {
            return Err(PipelineError::NoData(symbol.to_string()));
        }
        if bars.len() < cfg.warmup_bars {
            warn!(
                symbol = %symbol,
                bars = bars.len(),
                required = cfg.warmup_bars,
                "only {} bars for {}, early indicators stay NaN",
                bars.len(),
                symbol
            );
            outcome.warnings.push(PipelineWarning::InsufficientHistory {
                required: cfg.warmup_bars,
                actual: bars.len(),
            });
        }

        let frame = self.ctx.calculator.compute(&bars);
        frame.validate_alignment(&bars)?;
        outcome.indicator_count = self.ctx.repository.write_indicators(symbol, &frame).await?;

        let composites = self.ctx.engine.evaluate(symbol, &bars, &frame, from)?;
        outcome.composite_count = self.ctx.repository.write_composites(&composites).await?;
        outcome.latest_signal = composites.last().cloned();

        if let Some(metrics) = &self.ctx.metrics {
            metrics.composite_signals_total.inc_by(outcome.composite_count as u64);
        }
        if let Some(signal) = &outcome.latest_signal {
            info!(
                symbol = %symbol,
                timestamp = %signal.timestamp,
                score = signal.score,
                action = %signal.action,
                events = signal.contributing_events.len(),
                "latest signal for {}: {} ({:.2})",
                symbol,
                signal.action,
                signal.score
            );
        }
        Ok(outcome)
    }

    /// Compares the newest stored composite with the newest stored bar, so a run
    /// that committed bars but died before persisting signals is caught up later.
    async fn composite_coverage(&self, symbol: &str) -> Result<CompositeCoverage, PipelineError> {
        let repo = &self.ctx.repository;
        let latest = repo.latest_composites(Some(symbol), 1).await?.into_iter().next();
        let Some(info) = repo.series_info(symbol).await? else {
            return Ok(CompositeCoverage::Current(latest));
        };
        Ok(match latest {
            None => CompositeCoverage::Missing,
            Some(signal) if signal.timestamp < info.latest => CompositeCoverage::Behind(signal.timestamp),
            Some(signal) => CompositeCoverage::Current(Some(signal)),
        })
    }

    /// Fetch, reconcile and apply. Returns the applied plan.
    async fn sync_bars(
        &self,
        symbol: &str,
        as_of: DateTime<Utc>,
        outcome: &mut SymbolOutcome,
    ) -> Result<UpdatePlan, PipelineError> {
        let cfg = &self.config;
        let repo = &self.ctx.repository;
        let stored_info = repo.series_info(symbol).await?;

        let window_start = match &stored_info {
            Some(stored) => plan_window_start(Some(stored.latest), as_of, cfg.lookback_days),
            None => as_of - ChronoDuration::days(cfg.initial_history_days),
        };
        let fetch_start = match cfg.mode {
            RunMode::ExpandHistory => window_start.min(as_of - ChronoDuration::days(cfg.expand_history_days)),
            _ => window_start,
        };

        let fetched = fetch_symbol(
            self.ctx.provider.as_ref(),
            cfg.market,
            symbol,
            cfg.interval,
            FetchRange::new(fetch_start, as_of),
            self.retry_policy(),
        )
        .await?;
        if fetched.bars.is_empty() {
            return Err(PipelineError::NoData(symbol.to_string()));
        }
        validate_window(symbol, "fetched", &fetched.bars)?;
        outcome.ticker = Some(fetched.ticker.clone());

        let fetched_window = trailing_slice(&fetched.bars, window_start);
        let window_end = fetched
            .bars
            .last()
            .map(|b| b.timestamp.max(as_of))
            .unwrap_or(as_of);
        let stored = repo.read_window(symbol, window_start, window_end).await?;

        let reconciler = WindowReconciler::new(cfg.tolerance, cfg.lookback_days);
        let mut plan = reconciler.reconcile(symbol, &stored, fetched_window)?;
        if cfg.mode == RunMode::ExpandHistory {
            let rows = backfill(stored_info.as_ref().map(|s| s.earliest), &fetched.bars);
            if !rows.is_empty() {
                info!(symbol = %symbol, rows = rows.len(), "extending history for {}", symbol);
            }
            plan = plan.with_backfill(rows);
        }

        let counts = repo.apply_plan(&plan).await?;
        outcome.inserted = counts.inserted;
        outcome.updated = counts.updated;
        outcome.unchanged = plan.unchanged_count;

        if let Some(metrics) = &self.ctx.metrics {
            metrics.bars_inserted_total.inc_by(counts.inserted as u64);
            metrics.bars_updated_total.inc_by(counts.updated as u64);
            metrics.bars_unchanged_total.inc_by(plan.unchanged_count as u64);
        }
        info!(
            symbol = %symbol,
            ticker = %fetched.ticker,
            inserted = counts.inserted,
            updated = counts.updated,
            unchanged = plan.unchanged_count,
            "synced {}: {} inserted, {} updated, {} unchanged",
            symbol,
            counts.inserted,
            counts.updated,
            plan.unchanged_count
        );
        Ok(plan)
    }
}

/// Per-symbol row of a batch summary.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolReport {
    pub symbol: String,
    pub ticker: Option<String>,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub indicator_count: usize,
    pub composite_count: usize,
    pub latest_signal: Option<CompositeSignal>,
    pub warnings: Vec<PipelineWarning>,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    pub error: Option<String>,
    pub error_kind: Option<&'static str>,
}

fn serialize_millis<S: serde::Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_millis() as u64)
}

impl SymbolReport {
    pub fn from_result(symbol: &str, result: Result<SymbolOutcome, PipelineError>, elapsed: Duration) -> Self {
        match result {
            Ok(outcome) => Self {
                symbol: symbol.to_string(),
                ticker: outcome.ticker,
                inserted: outcome.inserted,
                updated: outcome.updated,
                unchanged: outcome.unchanged,
                indicator_count: outcome.indicator_count,
                composite_count: outcome.composite_count,
                latest_signal: outcome.latest_signal,
                warnings: outcome.warnings,
                elapsed,
                error: None,
                error_kind: None,
            },
            Err(e) => Self {
                symbol: symbol.to_string(),
                ticker: None,
                inserted: 0,
                updated: 0,
                unchanged: 0,
                indicator_count: 0,
                composite_count: 0,
                latest_signal: None,
                warnings: Vec::new(),
                elapsed,
                error: Some(e.to_string()),
                error_kind: Some(e.kind()),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub reports: Vec<SymbolReport>,
    pub succeeded: usize,
    pub failed: usize,
    pub inserted: usize,
    pub updated: usize,
    pub composites: usize,
}

impl BatchSummary {
    pub fn new(started_at: DateTime<Utc>, reports: Vec<SymbolReport>) -> Self {
        let succeeded = reports.iter().filter(|r| r.is_success()).count();
        Self {
            started_at,
            finished_at: Utc::now(),
            succeeded,
            failed: reports.len() - succeeded,
            inserted: reports.iter().map(|r| r.inserted).sum(),
            updated: reports.iter().map(|r| r.updated).sum(),
            composites: reports.iter().map(|r| r.composite_count).sum(),
            reports,
        }
    }

    pub fn report(&self, symbol: &str) -> Option<&SymbolReport> {
        self.reports.iter().find(|r| r.symbol == symbol)
    }
}

/// Resolves once shutdown has been requested. A dropped sender never resolves.
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Runs many symbols through the pipeline with bounded concurrency.
pub struct BatchRunner {
    pipeline: Arc<SymbolPipeline>,
    concurrency: usize,
    symbol_timeout: Duration,
    metrics: Option<Arc<Metrics>>,
}

impl BatchRunner {
    pub fn new(pipeline: Arc<SymbolPipeline>, concurrency: usize, symbol_timeout: Duration) -> Self {
        Self {
            pipeline,
            concurrency: concurrency.max(1),
            symbol_timeout,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Run `symbols` and return their reports in input order.
    ///
    /// A failed, timed-out or cancelled symbol never affects the others, and rows a
    /// symbol already committed stay committed.
    pub async fn run(
        &self,
        symbols: &[String],
        as_of: DateTime<Utc>,
        shutdown: watch::Receiver<bool>,
    ) -> BatchSummary {
        let started_at = Utc::now();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        if let Some(metrics) = &self.metrics {
            metrics.batches_in_flight.inc();
        }
        info!(
            symbols = symbols.len(),
            concurrency = self.concurrency,
            "starting batch of {} symbols",
            symbols.len()
        );

        let mut handles = Vec::with_capacity(symbols.len());
        for name in symbols {
            let symbol = name.clone();
            let pipeline = self.pipeline.clone();
            let semaphore = semaphore.clone();
            let mut shutdown = shutdown.clone();
            let timeout = self.symbol_timeout;

            let handle = tokio::spawn(async move {
                let started = Instant::now();
                let permit = tokio::select! {
                    biased;
                    _ = shutdown_requested(&mut shutdown) => None,
                    permit = semaphore.acquire_owned() => permit.ok(),
                };
                let Some(_permit) = permit else {
                    return SymbolReport::from_result(&symbol, Err(PipelineError::Cancelled), started.elapsed());
                };

                let result = tokio::select! {
                    biased;
                    _ = shutdown_requested(&mut shutdown) => Err(PipelineError::Cancelled),
                    run = tokio::time::timeout(timeout, pipeline.run(&symbol, as_of)) => {
                        run.unwrap_or(Err(PipelineError::Timeout(timeout)))
                    }
                };
                SymbolReport::from_result(&symbol, result, started.elapsed())
            });
            handles.push((name.clone(), handle));
        }

        let mut reports = Vec::with_capacity(handles.len());
        for (symbol, handle) in handles {
            let report = match handle.await {
                Ok(report) => report,
                Err(e) => SymbolReport::from_result(
                    &symbol,
                    Err(PipelineError::TaskFailed(e.to_string())),
                    Duration::ZERO,
                ),
            };
            self.record(&report);
            reports.push(report);
        }

        if let Some(metrics) = &self.metrics {
            metrics.batches_in_flight.dec();
        }
        let summary = BatchSummary::new(started_at, reports);
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            inserted = summary.inserted,
            updated = summary.updated,
            composites = summary.composites,
            "batch finished: {} ok, {} failed",
            summary.succeeded,
            summary.failed
        );
        summary
    }

    fn record(&self, report: &SymbolReport) {
        if let Some(err) = &report.error {
            error!(
                symbol = %report.symbol,
                kind = report.error_kind.unwrap_or("unknown"),
                error = %err,
                "pipeline failed for {}",
                report.symbol
            );
        }
        if let Some(metrics) = &self.metrics {
            metrics.symbols_processed_total.inc();
            if !report.is_success() {
                metrics.symbols_failed_total.inc();
            }
            metrics
                .symbol_duration_seconds
                .observe(report.elapsed.as_secs_f64());
        }
    }
}
