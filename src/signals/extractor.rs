//! Extractor capability and the shared evaluation input.

use crate::common::math;
use crate::models::{IndicatorFrame, PriceBar, SeriesRef, SignalEvent};
use chrono::{DateTime, Utc};

/// Aligned bars and indicator series for one symbol, with price columns pre-split.
pub struct ExtractionInput<'a> {
    pub bars: &'a [PriceBar],
    pub frame: &'a IndicatorFrame,
    pub close: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub volume: Vec<f64>,
    pub returns: Vec<f64>,
}

impl<'a> ExtractionInput<'a> {
    /// Callers are expected to have checked `frame.validate_alignment(bars)`.
    pub fn new(bars: &'a [PriceBar], frame: &'a IndicatorFrame) -> Self {
        let close: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let returns = math::simple_returns(&close);
        Self {
            bars,
            frame,
            high: bars.iter().map(|b| b.high).collect(),
            low: bars.iter().map(|b| b.low).collect(),
            volume: bars.iter().map(|b| b.volume as f64).collect(),
            close,
            returns,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn timestamp(&self, index: usize) -> Option<DateTime<Utc>> {
        self.bars.get(index).map(|b| b.timestamp)
    }

    /// Finite indicator value, `None` during warm-up or when the series is absent.
    pub fn value(&self, series: &SeriesRef, index: usize) -> Option<f64> {
        self.frame.value(series, index)
    }
}

/// One detector family instance. Extractors never see each other's output.
pub trait SignalExtractor: Send + Sync {
    /// `indicator_name` stamped on every event this extractor emits.
    fn name(&self) -> &str;

    /// Events for the bar at `index`. Missing or NaN inputs produce no event.
    fn extract(&self, input: &ExtractionInput<'_>, index: usize) -> Vec<SignalEvent>;
}
