//! Overbought/oversold zones, volatility band breaks and trend bias.
//!
//! Unlike crossings these are state signals: an event is emitted on every bar
//! the condition holds.

use crate::models::{SeriesRef, SignalDirection, SignalEvent, SignalKind};
use crate::signals::crossing::{CrossReference, GapNormalizer};
use crate::signals::extractor::{ExtractionInput, SignalExtractor};

/// Value tested against the zone edges.
#[derive(Debug, Clone, PartialEq)]
pub enum ZoneSubject {
    /// Every line must be past the edge (KD needs both K and D).
    Lines(Vec<SeriesRef>),
    Close,
}

/// Fires above `upper` (bearish) and below `lower` (bullish).
///
/// strength = `min(1, 0.5 + excess / (upper - lower))` where `excess` is the
/// smallest distance past the edge over all subject lines. With
/// [`ZoneExtractor::approaching`] it fires instead while the subject sits within
/// `width` inside an edge, at strength `0.25..0.5` rising toward the edge.
#[derive(Debug, Clone)]
pub struct ZoneExtractor {
    name: String,
    subject: ZoneSubject,
    upper: CrossReference,
    lower: CrossReference,
    above: SignalKind,
    below: SignalKind,
    approach: Option<f64>,
}

impl ZoneExtractor {
    /// Fixed-level oscillator zone, e.g. RSI 70/30.
    pub fn oscillator(name: impl Into<String>, line: SeriesRef, overbought: f64, oversold: f64) -> Self {
        Self {
            name: name.into(),
            subject: ZoneSubject::Lines(vec![line]),
            upper: CrossReference::Level(overbought),
            lower: CrossReference::Level(oversold),
            above: SignalKind::Overbought,
            below: SignalKind::Oversold,
            approach: None,
        }
    }

    /// Close outside a band whose edges are indicator series.
    pub fn band(name: impl Into<String>, upper: SeriesRef, lower: SeriesRef) -> Self {
        Self {
            name: name.into(),
            subject: ZoneSubject::Close,
            upper: CrossReference::Series(upper),
            lower: CrossReference::Series(lower),
            above: SignalKind::BandBreak,
            below: SignalKind::BandBreak,
            approach: None,
        }
    }

    /// Require another line past the edge as well.
    pub fn with_line(mut self, line: SeriesRef) -> Self {
        match &mut self.subject {
            ZoneSubject::Lines(lines) => lines.push(line),
            ZoneSubject::Close => self.subject = ZoneSubject::Lines(vec![line]),
        }
        self
    }

    /// Fire while within `width` inside an edge instead of beyond it.
    pub fn approaching(mut self, width: f64) -> Self {
        self.approach = Some(width);
        self
    }

    fn subject_values(&self, input: &ExtractionInput<'_>, index: usize) -> Option<Vec<f64>> {
        match &self.subject {
            ZoneSubject::Close => input.close.get(index).copied().filter(|c| c.is_finite()).map(|c| vec![c]),
            ZoneSubject::Lines(lines) => lines.iter().map(|line| input.value(line, index)).collect(),
        }
    }

    fn locate(&self, values: &[f64], upper: f64, lower: f64) -> Option<(SignalKind, SignalDirection, f64)> {
        match self.approach {
            None => {
                let span = upper - lower;
                let past_upper = values.iter().map(|v| v - upper).fold(f64::INFINITY, f64::min);
                let past_lower = values.iter().map(|v| lower - v).fold(f64::INFINITY, f64::min);
                if past_upper >= 0.0 {
                    Some((self.above, SignalDirection::Bearish, (0.5 + past_upper / span).min(1.0)))
                } else if past_lower >= 0.0 {
                    Some((self.below, SignalDirection::Bullish, (0.5 + past_lower / span).min(1.0)))
                } else {
                    None
                }
            }
            Some(width) => {
                if let Some(strength) = approach_strength(values.iter().map(|v| upper - v), width) {
                    Some((self.above, SignalDirection::Bearish, strength))
                } else {
                    approach_strength(values.iter().map(|v| v - lower), width)
                        .map(|strength| (self.below, SignalDirection::Bullish, strength))
                }
            }
        }
    }
}

/// Every value strictly short of the edge by at most `width`; strength follows the
/// furthest one.
fn approach_strength(shortfalls: impl Iterator<Item = f64>, width: f64) -> Option<f64> {
    if width <= 0.0 {
        return None;
    }
    let mut furthest: Option<f64> = None;
    for short in shortfalls {
        if !(short > 0.0 && short <= width) {
            return None;
        }
        furthest = Some(furthest.map_or(short, |f: f64| f.max(short)));
    }
    furthest.map(|short| 0.25 + 0.25 * (1.0 - short / width))
}

impl SignalExtractor for ZoneExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    fn extract(&self, input: &ExtractionInput<'_>, index: usize) -> Vec<SignalEvent> {
        let Some(timestamp) = input.timestamp(index) else {
            return Vec::new();
        };
        let (Some(upper), Some(lower)) = (self.upper.resolve(input, index), self.lower.resolve(input, index)) else {
            return Vec::new();
        };
        if upper <= lower {
            return Vec::new();
        }
        let Some(values) = self.subject_values(input, index) else {
            return Vec::new();
        };

        self.locate(&values, upper, lower)
            .map(|(kind, direction, strength)| {
                vec![SignalEvent::new(timestamp, self.name.clone(), kind, strength, direction)]
            })
            .unwrap_or_default()
    }
}

/// Close above `baseline` is bullish, below is bearish.
/// strength = `min(1, |close - baseline| / normalizer)`.
#[derive(Debug, Clone)]
pub struct TrendExtractor {
    name: String,
    baseline: SeriesRef,
    normalizer: GapNormalizer,
}

impl TrendExtractor {
    pub fn new(name: impl Into<String>, baseline: SeriesRef, normalizer: GapNormalizer) -> Self {
        Self {
            name: name.into(),
            baseline,
            normalizer,
        }
    }
}

impl SignalExtractor for TrendExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    fn extract(&self, input: &ExtractionInput<'_>, index: usize) -> Vec<SignalEvent> {
        let (Some(timestamp), Some(close)) = (input.timestamp(index), input.close.get(index).copied()) else {
            return Vec::new();
        };
        let Some(baseline) = input.value(&self.baseline, index) else {
            return Vec::new();
        };
        let gap = close - baseline;
        if gap == 0.0 || !gap.is_finite() {
            return Vec::new();
        }
        let Some(scale) = self.normalizer.resolve(input, index) else {
            return Vec::new();
        };

        let strength = (gap.abs() / scale).min(1.0);
        vec![SignalEvent::new(
            timestamp,
            self.name.clone(),
            SignalKind::TrendBias,
            strength,
            SignalDirection::from_sign(gap),
        )]
    }
}
