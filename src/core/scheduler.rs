//! Cron-driven batch scheduler for the worker.

use crate::core::pipeline::{BatchRunner, BatchSummary};
use crate::error::ConfigError;
use chrono::Utc;
use cron::Schedule;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::{info, warn};

pub type LatestBatch = Arc<RwLock<Option<BatchSummary>>>;

/// Cron expression (seconds field first) firing every `interval_seconds`.
pub fn cron_for_interval(interval_seconds: u64) -> Result<String, ConfigError> {
    let invalid = |reason: &str| ConfigError::Invalid {
        key: "SYNC_INTERVAL_SECONDS",
        value: interval_seconds.to_string(),
        reason: reason.to_string(),
    };
    match interval_seconds {
        0 => Err(invalid("scheduler disabled: interval is 0")),
        s if s < 60 => Ok(format!("*/{} * * * * *", s)),
        s if s < 3600 => {
            if s % 60 != 0 {
                return Err(invalid("intervals of a minute or more must be whole minutes"));
            }
            Ok(format!("0 */{} * * * *", s / 60))
        }
        s => {
            if s % 3600 != 0 {
                return Err(invalid("intervals of an hour or more must be whole hours"));
            }
            Ok(format!("0 0 */{} * * *", s / 3600))
        }
    }
}

pub fn parse_schedule(expr: &str) -> Result<Schedule, ConfigError> {
    Schedule::from_str(expr).map_err(|e| ConfigError::Invalid {
        key: "SYNC_CRON",
        value: expr.to_string(),
        reason: e.to_string(),
    })
}

/// Runs a batch over `symbols` on every cron tick and keeps the newest summary.
pub struct JobScheduler {
    runner: Arc<BatchRunner>,
    symbols: Vec<String>,
    schedule: Schedule,
    latest: LatestBatch,
    shutdown: watch::Receiver<bool>,
    handle: RwLock<Option<tokio::task::JoinHandle<()>>>,
}

impl JobScheduler {
    pub fn new(
        runner: Arc<BatchRunner>,
        symbols: Vec<String>,
        schedule: Schedule,
        latest: LatestBatch,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        info!(
            symbols = ?symbols,
            schedule = %schedule,
            "scheduler created for {} symbols",
            symbols.len()
        );
        Self {
            runner,
            symbols,
            schedule,
            latest,
            shutdown,
            handle: RwLock::new(None),
        }
    }

    pub async fn start(&self) {
        let runner = self.runner.clone();
        let symbols = self.symbols.clone();
        let schedule = self.schedule.clone();
        let latest = self.latest.clone();
        let shutdown = self.shutdown.clone();

        let handle = tokio::spawn(async move {
            loop {
                let Some(next_tick) = schedule.upcoming(Utc).next() else {
                    warn!("schedule has no upcoming ticks, scheduler exiting");
                    return;
                };
                let wait = (next_tick - Utc::now()).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;
                if *shutdown.borrow() {
                    return;
                }

                info!(tick = %next_tick, symbols = symbols.len(), "cron tick, running batch");
                let summary = runner.run(&symbols, Utc::now(), shutdown.clone()).await;
                *latest.write().await = Some(summary);
            }
        });

        *self.handle.write().await = Some(handle);
        info!("scheduler started");
    }

    pub async fn stop(&self) {
        if let Some(handle) = self.handle.write().await.take() {
            handle.abort();
            info!("scheduler stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.handle.read().await.is_some()
    }
}
