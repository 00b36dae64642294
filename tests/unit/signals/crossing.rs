//! Unit tests for crossing extractors

use crate::support::{approx, closes, frame};
use stocksignal::models::{SeriesRef, SignalDirection, SignalKind};
use stocksignal::signals::{
    CrossReference, CrossingExtractor, ExtractionInput, GapNormalizer, SignalExtractor,
};

fn line_cross() -> CrossingExtractor {
    CrossingExtractor::new(
        "test_cross",
        SeriesRef::scalar("fast"),
        CrossReference::Series(SeriesRef::scalar("slow")),
        GapNormalizer::Volatility(SeriesRef::scalar("atr")),
    )
}

#[test]
fn test_cross_up_emitted_on_sign_change_only() {
    let bars = closes(&[10.0, 10.0, 10.0, 10.0]);
    let frame = frame(
        &bars,
        &[
            ("fast", vec![1.0, 2.0, 3.0, 5.0]),
            ("slow", vec![2.0, 2.5, 2.75, 3.0]),
            ("atr", vec![1.0; 4]),
        ],
    );
    let input = ExtractionInput::new(&bars, &frame);
    let extractor = line_cross();

    assert!(extractor.extract(&input, 1).is_empty());
    let events = extractor.extract(&input, 2);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, SignalKind::CrossUp);
    assert_eq!(events[0].direction, SignalDirection::Bullish);
    assert_eq!(events[0].indicator_name, "test_cross");
    assert_eq!(events[0].timestamp, bars[2].timestamp);
    assert!(approx(events[0].strength, 0.25));
    // still above: no repeat
    assert!(extractor.extract(&input, 3).is_empty());
}

#[test]
fn test_cross_down_strength_clamped() {
    let bars = closes(&[10.0, 10.0]);
    let frame = frame(
        &bars,
        &[("fast", vec![5.0, -5.0]), ("slow", vec![0.0, 0.0]), ("atr", vec![1.0, 1.0])],
    );
    let input = ExtractionInput::new(&bars, &frame);
    let events = line_cross().extract(&input, 1);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, SignalKind::CrossDown);
    assert_eq!(events[0].direction, SignalDirection::Bearish);
    assert!(approx(events[0].strength, 1.0));
}

#[test]
fn test_touching_bar_is_skipped_when_finding_previous_side() {
    let bars = closes(&[10.0, 10.0, 10.0]);
    let frame = frame(
        &bars,
        &[("fast", vec![1.0, 2.0, 3.0]), ("slow", vec![2.0, 2.0, 2.0]), ("atr", vec![2.0; 3])],
    );
    let input = ExtractionInput::new(&bars, &frame);
    let extractor = line_cross();
    assert!(extractor.extract(&input, 1).is_empty());
    let events = extractor.extract(&input, 2);
    assert_eq!(events.len(), 1);
    assert!(approx(events[0].strength, 0.5));
}

#[test]
fn test_warmup_nan_produces_no_event() {
    let bars = closes(&[10.0, 10.0]);
    let frame = frame(
        &bars,
        &[("fast", vec![f64::NAN, 3.0]), ("slow", vec![2.0, 2.0]), ("atr", vec![1.0, 1.0])],
    );
    let input = ExtractionInput::new(&bars, &frame);
    assert!(line_cross().extract(&input, 1).is_empty());
}

#[test]
fn test_missing_series_produces_no_event() {
    let bars = closes(&[10.0, 10.0]);
    let frame = frame(&bars, &[("fast", vec![1.0, 3.0])]);
    let input = ExtractionInput::new(&bars, &frame);
    assert!(line_cross().extract(&input, 1).is_empty());
}

#[test]
fn test_zero_line_cross_with_fixed_scale() {
    let bars = closes(&[10.0, 10.0]);
    let frame = frame(&bars, &[("mom", vec![-5.0, 10.0])]);
    let input = ExtractionInput::new(&bars, &frame);
    let extractor = CrossingExtractor::new(
        "mom_zero_cross",
        SeriesRef::scalar("mom"),
        CrossReference::Level(0.0),
        GapNormalizer::Fixed(100.0),
    );
    let events = extractor.extract(&input, 1);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, SignalKind::CrossUp);
    assert!(approx(events[0].strength, 0.1));
}
