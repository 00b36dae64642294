//! In-process repository used by tests and by runs without a database.

use crate::db::{check_plan, Repository};
use crate::error::RepositoryError;
use crate::models::{ApplyCounts, CompositeSignal, IndicatorFrame, PriceBar, SeriesInfo, UpdatePlan};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

pub type IndicatorRow = BTreeMap<String, Option<f64>>;

#[derive(Default)]
struct MemoryState {
    bars: HashMap<String, BTreeMap<DateTime<Utc>, PriceBar>>,
    indicators: HashMap<String, BTreeMap<DateTime<Utc>, IndicatorRow>>,
    composites: HashMap<String, BTreeMap<DateTime<Utc>, CompositeSignal>>,
}

/// One lock guards all tables, so a plan is applied in a single critical section.
#[derive(Default)]
pub struct MemoryRepository {
    state: RwLock<MemoryState>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `bars` as-is, overwriting same-key rows.
    pub async fn seed(&self, bars: &[PriceBar]) {
        let mut state = self.state.write().await;
        for bar in bars {
            state
                .bars
                .entry(bar.symbol.clone())
                .or_default()
                .insert(bar.timestamp, bar.clone());
        }
    }

    pub async fn bars(&self, symbol: &str) -> Vec<PriceBar> {
        let state = self.state.read().await;
        state
            .bars
            .get(symbol)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn indicator_rows(&self, symbol: &str) -> Vec<(DateTime<Utc>, IndicatorRow)> {
        let state = self.state.read().await;
        state
            .indicators
            .get(symbol)
            .map(|rows| rows.iter().map(|(ts, row)| (*ts, row.clone())).collect())
            .unwrap_or_default()
    }

    pub async fn composites(&self, symbol: &str) -> Vec<CompositeSignal> {
        let state = self.state.read().await;
        state
            .composites
            .get(symbol)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn series_info(&self, symbol: &str) -> Result<Option<SeriesInfo>, RepositoryError> {
        let state = self.state.read().await;
        let Some(rows) = state.bars.get(symbol) else {
            return Ok(None);
        };
        let (Some((earliest, _)), Some((latest, _))) = (rows.first_key_value(), rows.last_key_value()) else {
            return Ok(None);
        };
        Ok(Some(SeriesInfo {
            symbol: symbol.to_string(),
            earliest: *earliest,
            latest: *latest,
            count: rows.len(),
        }))
    }

    async fn read_window(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PriceBar>, RepositoryError> {
        if start > end {
            return Ok(Vec::new());
        }
        let state = self.state.read().await;
        Ok(state
            .bars
            .get(symbol)
            .map(|rows| rows.range(start..=end).map(|(_, bar)| bar.clone()).collect())
            .unwrap_or_default())
    }

    async fn read_latest(&self, symbol: &str, limit: usize) -> Result<Vec<PriceBar>, RepositoryError> {
        let state = self.state.read().await;
        let mut bars: Vec<PriceBar> = state
            .bars
            .get(symbol)
            .map(|rows| rows.values().rev().take(limit).cloned().collect())
            .unwrap_or_default();
        bars.reverse();
        Ok(bars)
    }

    async fn apply_plan(&self, plan: &UpdatePlan) -> Result<ApplyCounts, RepositoryError> {
        check_plan(plan)?;
        let mut state = self.state.write().await;
        let rows = state.bars.entry(plan.symbol.clone()).or_default();
        for bar in &plan.to_insert {
            rows.insert(bar.timestamp, bar.clone());
        }
        for (ts, bar) in &plan.to_update {
            rows.insert(*ts, bar.clone());
        }
        Ok(ApplyCounts {
            inserted: plan.to_insert.len(),
            updated: plan.to_update.len(),
        })
    }

    async fn write_indicators(&self, symbol: &str, frame: &IndicatorFrame) -> Result<usize, RepositoryError> {
        let rows = frame.rows();
        let written = rows.len();
        let mut state = self.state.write().await;
        let stored = state.indicators.entry(symbol.to_string()).or_default();
        for (ts, row) in rows {
            stored.insert(ts, row);
        }
        Ok(written)
    }

    async fn write_composite(&self, signal: &CompositeSignal) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state
            .composites
            .entry(signal.symbol.clone())
            .or_default()
            .insert(signal.timestamp, signal.clone());
        Ok(())
    }

    async fn latest_composites(
        &self,
        symbol: Option<&str>,
        limit: usize,
    ) -> Result<Vec<CompositeSignal>, RepositoryError> {
        let state = self.state.read().await;
        let signals = match symbol {
            Some(symbol) => state
                .composites
                .get(symbol)
                .map(|rows| rows.values().rev().take(limit).cloned().collect())
                .unwrap_or_default(),
            None => {
                let mut latest: Vec<CompositeSignal> = state
                    .composites
                    .values()
                    .filter_map(|rows| rows.values().next_back().cloned())
                    .collect();
                latest.sort_by(|a, b| a.symbol.cmp(&b.symbol));
                latest.truncate(limit);
                latest
            }
        };
        Ok(signals)
    }
}
