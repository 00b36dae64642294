//! Touches of clustered swing-high/low price levels.

use crate::common::math::{is_swing_high, is_swing_low};
use crate::models::{SignalDirection, SignalEvent, SignalKind};
use crate::signals::extractor::{ExtractionInput, SignalExtractor};

pub const DEFAULT_LEVEL_SWING_K: usize = 3;
pub const DEFAULT_LEVEL_LOOKBACK: usize = 120;
pub const DEFAULT_CLUSTER_BAND: f64 = 0.015;
pub const DEFAULT_TOUCH_TOLERANCE: f64 = 0.01;

/// A merged price level and the number of pivots behind it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceLevel {
    pub price: f64,
    pub touches: usize,
}

/// Greedy clustering over sorted prices: a price joins the current cluster when it
/// lies within `band` (fraction) of the cluster's running mean.
pub fn cluster_levels(prices: &[f64], band: f64) -> Vec<PriceLevel> {
    let mut sorted: Vec<f64> = prices.iter().copied().filter(|p| p.is_finite()).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mut levels: Vec<PriceLevel> = Vec::new();
    let mut sum = 0.0;
    for price in sorted {
        let joins = levels
            .last()
            .is_some_and(|level| (price - level.price).abs() <= band * level.price.abs());
        if joins {
            let last = levels.len() - 1;
            let level = &mut levels[last];
            sum += price;
            level.touches += 1;
            level.price = sum / level.touches as f64;
        } else {
            sum = price;
            levels.push(PriceLevel { price, touches: 1 });
        }
    }
    levels
}

#[derive(Debug, Clone)]
pub struct SupportResistanceExtractor {
    name: String,
    swing_k: usize,
    lookback: usize,
    cluster_band: f64,
    touch_tolerance: f64,
}

impl SupportResistanceExtractor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            swing_k: DEFAULT_LEVEL_SWING_K,
            lookback: DEFAULT_LEVEL_LOOKBACK,
            cluster_band: DEFAULT_CLUSTER_BAND,
            touch_tolerance: DEFAULT_TOUCH_TOLERANCE,
        }
    }

    pub fn with_swing_k(mut self, k: usize) -> Self {
        self.swing_k = k;
        self
    }

    /// Bars searched back for pivots.
    pub fn with_lookback(mut self, lookback: usize) -> Self {
        self.lookback = lookback;
        self
    }

    /// Fraction of the running cluster mean within which pivots merge.
    pub fn with_cluster_band(mut self, band: f64) -> Self {
        self.cluster_band = band;
        self
    }

    pub fn with_touch_tolerance(mut self, tolerance: f64) -> Self {
        self.touch_tolerance = tolerance;
        self
    }

    /// Levels known at bar `index`: only pivots whose right-hand neighborhood
    /// closed before `index`.
    pub fn levels_at(&self, input: &ExtractionInput<'_>, index: usize) -> Vec<PriceLevel> {
        let k = self.swing_k;
        if index < 2 * k + 1 {
            return Vec::new();
        }
        let earliest = index.saturating_sub(self.lookback);
        let last_pivot = index - 1 - k;
        let mut prices = Vec::new();
        for j in earliest..=last_pivot {
            if is_swing_high(&input.high, j, k) {
                prices.push(input.high[j]);
            }
            if is_swing_low(&input.low, j, k) {
                prices.push(input.low[j]);
            }
        }
        cluster_levels(&prices, self.cluster_band)
    }
}

impl SignalExtractor for SupportResistanceExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    fn extract(&self, input: &ExtractionInput<'_>, index: usize) -> Vec<SignalEvent> {
        if index == 0 {
            return Vec::new();
        }
        let Some(timestamp) = input.timestamp(index) else {
            return Vec::new();
        };
        let (close, prev_close) = (input.close[index], input.close[index - 1]);
        if !close.is_finite() || !prev_close.is_finite() {
            return Vec::new();
        }

        let nearest = self
            .levels_at(input, index)
            .into_iter()
            .filter(|level| level.price > 0.0)
            .map(|level| ((close - level.price).abs() / level.price, level))
            .filter(|(distance, _)| *distance <= self.touch_tolerance)
            .min_by(|a, b| a.0.total_cmp(&b.0));
        let Some((distance, level)) = nearest else {
            return Vec::new();
        };

        let proximity = if self.touch_tolerance > 0.0 {
            1.0 - distance / self.touch_tolerance
        } else {
            1.0
        };
        let strength = 0.5 * proximity + 0.5 * (level.touches.min(4) as f64 / 4.0);
        let (kind, direction) = if prev_close >= level.price {
            (SignalKind::SupportTouch, SignalDirection::Bullish)
        } else {
            (SignalKind::ResistanceTouch, SignalDirection::Bearish)
        };
        vec![SignalEvent::new(timestamp, self.name.clone(), kind, strength, direction)]
    }
}
