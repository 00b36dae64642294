//! Window reconciliation: diff the trailing stored bars against the feed.
//!
//! Only the trailing window is ever compared. Rows outside it are either untouched
//! or, in history-extension mode, strictly older than anything stored.

use crate::config::{DEFAULT_LOOKBACK_DAYS, DEFAULT_TOLERANCE};
use crate::error::ReconciliationError;
use crate::models::{PriceBar, UpdatePlan};
use crate::reconcile::comparator::{compare, RowStatus};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tracing::debug;

/// Timestamps must be strictly increasing and every bar must belong to `symbol`.
pub fn validate_window(
    symbol: &str,
    window: &'static str,
    bars: &[PriceBar],
) -> Result<(), ReconciliationError> {
    if let Some(foreign) = bars.iter().find(|b| b.symbol != symbol) {
        return Err(ReconciliationError::ForeignSymbol {
            expected: symbol.to_string(),
            found: foreign.symbol.clone(),
            window,
        });
    }
    for (index, pair) in bars.windows(2).enumerate() {
        let (previous, current) = (pair[0].timestamp, pair[1].timestamp);
        if previous == current {
            return Err(ReconciliationError::DuplicateTimestamp {
                symbol: symbol.to_string(),
                window,
                timestamp: current,
            });
        }
        if previous > current {
            return Err(ReconciliationError::Unsorted {
                symbol: symbol.to_string(),
                window,
                index: index + 1,
                previous,
                current,
            });
        }
    }
    Ok(())
}

/// Start of the reconciliation window.
///
/// Normally `as_of - lookback_days`, pulled back to the latest stored bar when the
/// store is further behind than that so no hole opens after the last stored row.
pub fn plan_window_start(
    stored_latest: Option<DateTime<Utc>>,
    as_of: DateTime<Utc>,
    lookback_days: i64,
) -> DateTime<Utc> {
    let trailing = as_of - Duration::days(lookback_days);
    match stored_latest {
        Some(latest) if latest < trailing => latest,
        _ => trailing,
    }
}

/// Bars with `timestamp >= start`, assuming `bars` is sorted.
pub fn trailing_slice(bars: &[PriceBar], start: DateTime<Utc>) -> &[PriceBar] {
    let first = bars.partition_point(|b| b.timestamp < start);
    &bars[first..]
}

/// History-extension rows: fetched bars strictly older than the earliest stored one.
///
/// With nothing stored there is nothing to extend; the window path seeds the symbol.
pub fn backfill(stored_earliest: Option<DateTime<Utc>>, fetched: &[PriceBar]) -> Vec<PriceBar> {
    match stored_earliest {
        Some(earliest) => fetched
            .iter()
            .take_while(|b| b.timestamp < earliest)
            .cloned()
            .collect(),
        None => Vec::new(),
    }
}

/// Builds minimal update plans under a fixed price tolerance.
#[derive(Debug, Clone, Copy)]
pub struct WindowReconciler {
    pub tolerance: f64,
    pub lookback_days: i64,
}

impl Default for WindowReconciler {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
        }
    }
}

impl WindowReconciler {
    pub fn new(tolerance: f64, lookback_days: i64) -> Self {
        Self {
            tolerance,
            lookback_days,
        }
    }

    /// Diff `fetched` against `stored`.
    ///
    /// Both windows are expected to be pre-restricted to the same trailing range;
    /// no date filtering happens here. Stored rows missing from the feed are left
    /// alone. An empty feed window yields an empty plan with no bounds, which the
    /// caller must tell apart from "nothing changed".
    pub fn reconcile(
        &self,
        symbol: &str,
        stored: &[PriceBar],
        fetched: &[PriceBar],
    ) -> Result<UpdatePlan, ReconciliationError> {
        validate_window(symbol, "stored", stored)?;
        validate_window(symbol, "fetched", fetched)?;

        let mut plan = UpdatePlan::empty(symbol);
        if fetched.is_empty() {
            return Ok(plan);
        }
        plan.window_start = fetched.first().map(|b| b.timestamp);
        plan.window_end = fetched.last().map(|b| b.timestamp);

        let index: HashMap<DateTime<Utc>, &PriceBar> =
            stored.iter().map(|b| (b.timestamp, b)).collect();

        for bar in fetched {
            match compare(index.get(&bar.timestamp).copied(), bar, self.tolerance) {
                RowStatus::New => plan.to_insert.push(bar.clone()),
                RowStatus::Changed => plan.to_update.push((bar.timestamp, bar.clone())),
                RowStatus::Unchanged => plan.unchanged_count += 1,
            }
        }

        debug!(
            symbol = %symbol,
            inserts = plan.to_insert.len(),
            updates = plan.to_update.len(),
            unchanged = plan.unchanged_count,
            "reconciled window for {}",
            symbol
        );
        Ok(plan)
    }
}
