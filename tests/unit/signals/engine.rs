//! Unit tests for the signal engine

use crate::support::{wave_bars, SYMBOL};
use chrono::{TimeZone, Utc};
use stocksignal::error::AlignmentError;
use stocksignal::indicators::{IndicatorCalculator, TaCalculator};
use stocksignal::models::{PriceBar, SignalDirection, SignalEvent, SignalKind};
use stocksignal::signals::{ExtractionInput, FusionWeights, SignalEngine, SignalExtractor};

fn sample() -> Vec<PriceBar> {
    wave_bars(SYMBOL, Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(), 160)
}

struct Always(SignalDirection);

impl SignalExtractor for Always {
    fn name(&self) -> &str {
        "always"
    }

    fn extract(&self, input: &ExtractionInput<'_>, index: usize) -> Vec<SignalEvent> {
        input
            .timestamp(index)
            .map(|ts| vec![SignalEvent::new(ts, "always", SignalKind::Anomaly, 0.5, self.0)])
            .unwrap_or_default()
    }
}

#[test]
fn test_standard_catalogue() {
    let engine = SignalEngine::standard(FusionWeights::standard());
    let names = engine.extractor_names();
    assert_eq!(names.len(), 18);
    for name in ["ma_cross", "macd_divergence", "rsi_divergence", "price_anomaly", "support_resistance"] {
        assert!(names.contains(&name), "missing {}", name);
    }
}

#[test]
fn test_one_composite_per_bar_from_start() {
    let bars = sample();
    let frame = TaCalculator::default().compute(&bars);
    let engine = SignalEngine::standard(FusionWeights::standard());

    let all = engine.evaluate(SYMBOL, &bars, &frame, None).unwrap();
    assert_eq!(all.len(), bars.len());
    for (composite, bar) in all.iter().zip(&bars) {
        assert_eq!(composite.timestamp, bar.timestamp);
        assert_eq!(composite.symbol, SYMBOL);
        assert!((-1.0..=1.0).contains(&composite.score));
        assert!(composite
            .contributing_events
            .iter()
            .all(|e| e.timestamp == bar.timestamp && (0.0..=1.0).contains(&e.strength)));
    }
    assert!(all.iter().any(|c| !c.contributing_events.is_empty()));

    let from = bars[150].timestamp;
    let tail = engine.evaluate(SYMBOL, &bars, &frame, Some(from)).unwrap();
    assert_eq!(tail.len(), 10);
    assert_eq!(tail, all[150..].to_vec());
}

#[test]
fn test_evaluation_is_deterministic() {
    let bars = sample();
    let frame = TaCalculator::default().compute(&bars);
    let engine = SignalEngine::standard(FusionWeights::standard());
    let first = engine.evaluate(SYMBOL, &bars, &frame, None).unwrap();
    let second = engine.evaluate(SYMBOL, &bars, &frame, None).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_misaligned_frame_is_rejected() {
    let bars = sample();
    let frame = TaCalculator::default().compute(&bars[..100]);
    let engine = SignalEngine::standard(FusionWeights::standard());
    let err = engine.evaluate(SYMBOL, &bars, &frame, None).unwrap_err();
    assert!(matches!(err, AlignmentError::LengthMismatch { expected: 160, actual: 100, .. }));
}

#[test]
fn test_custom_extractors_fuse_together() {
    let bars = sample();
    let frame = TaCalculator::default().compute(&bars);
    let engine = SignalEngine::new(
        vec![Box::new(Always(SignalDirection::Bullish)), Box::new(Always(SignalDirection::Bullish))],
        FusionWeights::default(),
    );
    let composites = engine.evaluate(SYMBOL, &bars, &frame, Some(bars[159].timestamp)).unwrap();
    assert_eq!(composites.len(), 1);
    assert_eq!(composites[0].contributing_events.len(), 2);
    assert_eq!(composites[0].score, 1.0);
}
