use crate::models::bar::PriceBar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minimal set of writes that brings the stored window in line with the feed.
///
/// Produced once per reconciliation run and consumed by `Repository::apply_plan`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatePlan {
    pub symbol: String,
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
    pub to_insert: Vec<PriceBar>,
    pub to_update: Vec<(DateTime<Utc>, PriceBar)>,
    pub unchanged_count: usize,
}

impl UpdatePlan {
    pub fn empty(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            window_start: None,
            window_end: None,
            to_insert: Vec::new(),
            to_update: Vec::new(),
            unchanged_count: 0,
        }
    }

    /// True when applying the plan would not write anything.
    pub fn is_empty(&self) -> bool {
        self.to_insert.is_empty() && self.to_update.is_empty()
    }

    pub fn changed_count(&self) -> usize {
        self.to_insert.len() + self.to_update.len()
    }

    /// Prepend history-extension inserts (all strictly older than the window).
    pub fn with_backfill(mut self, mut rows: Vec<PriceBar>) -> Self {
        if rows.is_empty() {
            return self;
        }
        rows.sort_by_key(|b| b.timestamp);
        self.window_start = rows.first().map(|b| b.timestamp);
        if self.window_end.is_none() {
            self.window_end = rows.last().map(|b| b.timestamp);
        }
        rows.append(&mut self.to_insert);
        self.to_insert = rows;
        self
    }
}

/// Rows written by an applied plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyCounts {
    pub inserted: usize,
    pub updated: usize,
}

/// Summary of what is stored for one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesInfo {
    pub symbol: String,
    pub earliest: DateTime<Utc>,
    pub latest: DateTime<Utc>,
    pub count: usize,
}
