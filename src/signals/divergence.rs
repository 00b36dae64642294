//! Price/indicator divergence at successive swing points.

use crate::common::math::{is_swing_high, is_swing_low};
use crate::models::{SeriesRef, SignalDirection, SignalEvent, SignalKind};
use crate::signals::extractor::{ExtractionInput, SignalExtractor};

pub const DEFAULT_SWING_K: usize = 3;
pub const DEFAULT_DIVERGENCE_LOOKBACK: usize = 60;

/// Bearish when price prints a higher swing high while the indicator prints a
/// lower one; bullish for a lower price low against a higher indicator low.
///
/// Pivots need `k` bars on both sides, so the event for a swing at bar `i` is
/// only available once bar `i + k` exists. It is stamped at the second pivot.
#[derive(Debug, Clone)]
pub struct DivergenceExtractor {
    name: String,
    indicator: SeriesRef,
    swing_k: usize,
    lookback: usize,
}

impl DivergenceExtractor {
    pub fn new(name: impl Into<String>, indicator: SeriesRef) -> Self {
        Self {
            name: name.into(),
            indicator,
            swing_k: DEFAULT_SWING_K,
            lookback: DEFAULT_DIVERGENCE_LOOKBACK,
        }
    }

    pub fn with_swing_k(mut self, k: usize) -> Self {
        self.swing_k = k;
        self
    }

    pub fn with_lookback(mut self, lookback: usize) -> Self {
        self.lookback = lookback;
        self
    }

    fn previous_pivot(&self, close: &[f64], index: usize, high: bool) -> Option<usize> {
        let earliest = index.saturating_sub(self.lookback);
        (earliest..index).rev().find(|&j| {
            if high {
                is_swing_high(close, j, self.swing_k)
            } else {
                is_swing_low(close, j, self.swing_k)
            }
        })
    }

    fn compare(&self, input: &ExtractionInput<'_>, index: usize, high: bool) -> Option<SignalEvent> {
        let previous = self.previous_pivot(&input.close, index, high)?;
        let ind_prev = input.value(&self.indicator, previous)?;
        let ind_cur = input.value(&self.indicator, index)?;
        let (price_prev, price_cur) = (input.close[previous], input.close[index]);

        let direction = if high && price_cur > price_prev && ind_cur < ind_prev {
            SignalDirection::Bearish
        } else if !high && price_cur < price_prev && ind_cur > ind_prev {
            SignalDirection::Bullish
        } else {
            return None;
        };

        let magnitude = ind_prev.abs().max(ind_cur.abs());
        let strength = if magnitude > 0.0 {
            (0.5 + (ind_cur - ind_prev).abs() / magnitude).min(1.0)
        } else {
            0.5
        };
        Some(SignalEvent::new(
            input.timestamp(index)?,
            self.name.clone(),
            SignalKind::Divergence,
            strength,
            direction,
        ))
    }
}

impl SignalExtractor for DivergenceExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    fn extract(&self, input: &ExtractionInput<'_>, index: usize) -> Vec<SignalEvent> {
        let mut events = Vec::new();
        if is_swing_high(&input.close, index, self.swing_k) {
            events.extend(self.compare(input, index, true));
        }
        if is_swing_low(&input.close, index, self.swing_k) {
            events.extend(self.compare(input, index, false));
        }
        events
    }
}
