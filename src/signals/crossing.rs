//! Fast/slow line crossings (MA, EMA, MACD, KD, zero-line crosses).

use crate::models::{SeriesRef, SignalDirection, SignalEvent, SignalKind};
use crate::signals::extractor::{ExtractionInput, SignalExtractor};

/// What the fast line is crossing.
#[derive(Debug, Clone, PartialEq)]
pub enum CrossReference {
    Series(SeriesRef),
    Level(f64),
}

impl CrossReference {
    pub(crate) fn resolve(&self, input: &ExtractionInput<'_>, index: usize) -> Option<f64> {
        match self {
            CrossReference::Series(series) => input.value(series, index),
            CrossReference::Level(level) => Some(*level),
        }
    }
}

/// Scale for the post-cross gap.
#[derive(Debug, Clone, PartialEq)]
pub enum GapNormalizer {
    /// Recent volatility, usually `atr`.
    Volatility(SeriesRef),
    /// Constant scale for bounded oscillators.
    Fixed(f64),
}

impl GapNormalizer {
    /// Positive finite scale at `index`.
    pub(crate) fn resolve(&self, input: &ExtractionInput<'_>, index: usize) -> Option<f64> {
        let scale = match self {
            GapNormalizer::Volatility(series) => input.value(series, index)?,
            GapNormalizer::Fixed(scale) => *scale,
        };
        (scale.is_finite() && scale > 0.0).then_some(scale)
    }
}

#[derive(Debug, Clone)]
pub struct CrossingExtractor {
    name: String,
    fast: SeriesRef,
    slow: CrossReference,
    normalizer: GapNormalizer,
}

impl CrossingExtractor {
    pub fn new(
        name: impl Into<String>,
        fast: SeriesRef,
        slow: CrossReference,
        normalizer: GapNormalizer,
    ) -> Self {
        Self {
            name: name.into(),
            fast,
            slow,
            normalizer,
        }
    }

    fn gap(&self, input: &ExtractionInput<'_>, index: usize) -> Option<f64> {
        let fast = input.value(&self.fast, index)?;
        let slow = self.slow.resolve(input, index)?;
        Some(fast - slow)
    }

    /// Sign of the last non-zero gap before `index`. Zero gaps are skipped,
    /// a missing value ends the search.
    fn previous_sign(&self, input: &ExtractionInput<'_>, index: usize) -> Option<f64> {
        for j in (0..index).rev() {
            let gap = self.gap(input, j)?;
            if gap != 0.0 {
                return Some(gap.signum());
            }
        }
        None
    }
}

impl SignalExtractor for CrossingExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    fn extract(&self, input: &ExtractionInput<'_>, index: usize) -> Vec<SignalEvent> {
        let Some(timestamp) = input.timestamp(index) else {
            return Vec::new();
        };
        let Some(gap) = self.gap(input, index) else {
            return Vec::new();
        };
        if gap == 0.0 {
            return Vec::new();
        }
        let Some(previous) = self.previous_sign(input, index) else {
            return Vec::new();
        };
        if previous == gap.signum() {
            return Vec::new();
        }
        let Some(scale) = self.normalizer.resolve(input, index) else {
            return Vec::new();
        };

        let (kind, direction) = if gap > 0.0 {
            (SignalKind::CrossUp, SignalDirection::Bullish)
        } else {
            (SignalKind::CrossDown, SignalDirection::Bearish)
        };
        let strength = (gap.abs() / scale).min(1.0);
        vec![SignalEvent::new(timestamp, self.name.clone(), kind, strength, direction)]
    }
}
