//! Persistence for bars, indicator rows and composite signals.

pub mod memory;
pub mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PostgresRepository;

use crate::error::RepositoryError;
use crate::models::{ApplyCounts, CompositeSignal, IndicatorFrame, PriceBar, SeriesInfo, UpdatePlan};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Storage for one bar interval. Rows are keyed by `(symbol, timestamp)`.
#[async_trait]
pub trait Repository: Send + Sync {
    /// `None` when nothing is stored for `symbol`.
    async fn series_info(&self, symbol: &str) -> Result<Option<SeriesInfo>, RepositoryError>;

    /// Bars with `start <= timestamp <= end`, ascending.
    async fn read_window(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PriceBar>, RepositoryError>;

    /// The newest `limit` bars, ascending.
    async fn read_latest(&self, symbol: &str, limit: usize) -> Result<Vec<PriceBar>, RepositoryError>;

    /// Write every insert and update of `plan` as one unit. Either all rows become
    /// visible to readers or none do.
    async fn apply_plan(&self, plan: &UpdatePlan) -> Result<ApplyCounts, RepositoryError>;

    /// Upsert one row per timestamp of `frame`. Returns rows written.
    async fn write_indicators(&self, symbol: &str, frame: &IndicatorFrame) -> Result<usize, RepositoryError>;

    async fn write_composite(&self, signal: &CompositeSignal) -> Result<(), RepositoryError>;

    async fn write_composites(&self, signals: &[CompositeSignal]) -> Result<usize, RepositoryError> {
        for signal in signals {
            self.write_composite(signal).await?;
        }
        Ok(signals.len())
    }

    /// Newest composites for `symbol`, or the newest one per symbol when `None`.
    async fn latest_composites(
        &self,
        symbol: Option<&str>,
        limit: usize,
    ) -> Result<Vec<CompositeSignal>, RepositoryError>;
}

/// Rejects plans whose rows do not belong to the plan's symbol or whose update
/// keys disagree with the carried bar.
pub(crate) fn check_plan(plan: &UpdatePlan) -> Result<(), RepositoryError> {
    let foreign = plan
        .to_insert
        .iter()
        .chain(plan.to_update.iter().map(|(_, bar)| bar))
        .find(|bar| bar.symbol != plan.symbol);
    if let Some(bar) = foreign {
        return Err(RepositoryError::InvalidPlan {
            symbol: plan.symbol.clone(),
            reason: format!("row for {} at {}", bar.symbol, bar.timestamp),
        });
    }
    if let Some((ts, bar)) = plan.to_update.iter().find(|(ts, bar)| *ts != bar.timestamp) {
        return Err(RepositoryError::InvalidPlan {
            symbol: plan.symbol.clone(),
            reason: format!("update keyed {} carries bar at {}", ts, bar.timestamp),
        });
    }
    Ok(())
}
