//! Unit tests for support/resistance touches

use crate::support::{approx, bars_from};
use stocksignal::models::{IndicatorFrame, PriceBar, SignalDirection, SignalKind};
use stocksignal::signals::{cluster_levels, ExtractionInput, SignalExtractor, SupportResistanceExtractor};

const LOWS: [f64; 16] = [
    105.0, 104.0, 103.0, 100.0, 103.0, 104.0, 105.0, 106.0, 105.0, 104.0, 100.5, 104.0, 105.0,
    106.0, 103.0, 100.8,
];

/// Two swing lows near 100 (bars 3 and 10) and one swing high at 108 (bar 7).
fn double_bottom(prev_close: f64, close: f64) -> Vec<PriceBar> {
    let high: Vec<f64> = LOWS.iter().map(|l| l + 2.0).collect();
    let mut closes: Vec<f64> = LOWS.iter().map(|l| l + 1.0).collect();
    closes[14] = prev_close;
    closes[15] = close;
    bars_from(&high, &LOWS, &closes)
}

#[test]
fn test_cluster_merges_nearby_prices() {
    let levels = cluster_levels(&[110.0, 100.0, 100.5], 0.015);
    assert_eq!(levels.len(), 2);
    assert!(approx(levels[0].price, 100.25));
    assert_eq!(levels[0].touches, 2);
    assert!(approx(levels[1].price, 110.0));
    assert_eq!(levels[1].touches, 1);
}

#[test]
fn test_cluster_ignores_non_finite() {
    let levels = cluster_levels(&[f64::NAN, 50.0], 0.015);
    assert_eq!(levels.len(), 1);
}

#[test]
fn test_levels_use_only_confirmed_pivots() {
    let bars = double_bottom(104.0, 101.0);
    let frame = IndicatorFrame::new();
    let input = ExtractionInput::new(&bars, &frame);
    let levels = SupportResistanceExtractor::new("support_resistance").levels_at(&input, 15);

    assert_eq!(levels.len(), 2);
    assert!(approx(levels[0].price, 100.25));
    assert_eq!(levels[0].touches, 2);
    assert!(approx(levels[1].price, 108.0));

    // before the second low is confirmed only the first low and the high exist
    let early = SupportResistanceExtractor::new("support_resistance").levels_at(&input, 13);
    assert_eq!(early.len(), 2);
    assert!(approx(early[0].price, 100.0));
    assert_eq!(early[0].touches, 1);
}

#[test]
fn test_approach_from_above_is_support_touch() {
    let bars = double_bottom(104.0, 101.0);
    let frame = IndicatorFrame::new();
    let input = ExtractionInput::new(&bars, &frame);
    let events = SupportResistanceExtractor::new("support_resistance").extract(&input, 15);

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, SignalKind::SupportTouch);
    assert_eq!(events[0].direction, SignalDirection::Bullish);
    let proximity = 1.0 - ((101.0 - 100.25) / 100.25) / 0.01;
    assert!(approx(events[0].strength, 0.5 * proximity + 0.25));
}

#[test]
fn test_approach_from_below_is_resistance_touch() {
    let bars = double_bottom(99.0, 101.0);
    let frame = IndicatorFrame::new();
    let input = ExtractionInput::new(&bars, &frame);
    let events = SupportResistanceExtractor::new("support_resistance").extract(&input, 15);

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, SignalKind::ResistanceTouch);
    assert_eq!(events[0].direction, SignalDirection::Bearish);
}

#[test]
fn test_far_from_any_level_is_quiet() {
    let bars = double_bottom(104.0, 104.0);
    let frame = IndicatorFrame::new();
    let input = ExtractionInput::new(&bars, &frame);
    assert!(SupportResistanceExtractor::new("support_resistance")
        .extract(&input, 15)
        .is_empty());
}

#[test]
fn test_narrow_band_keeps_lows_apart() {
    let bars = double_bottom(104.0, 101.0);
    let frame = IndicatorFrame::new();
    let input = ExtractionInput::new(&bars, &frame);
    let levels = SupportResistanceExtractor::new("support_resistance")
        .with_cluster_band(0.001)
        .levels_at(&input, 15);

    assert_eq!(levels.len(), 3);
    assert!(approx(levels[0].price, 100.0));
    assert!(approx(levels[1].price, 100.5));
    assert!(levels.iter().all(|level| level.touches == 1));
}

#[test]
fn test_short_lookback_drops_old_pivots() {
    let bars = double_bottom(104.0, 101.0);
    let frame = IndicatorFrame::new();
    let input = ExtractionInput::new(&bars, &frame);
    let levels = SupportResistanceExtractor::new("support_resistance")
        .with_lookback(6)
        .levels_at(&input, 15);

    assert_eq!(levels.len(), 1);
    assert!(approx(levels[0].price, 100.5));
}

#[test]
fn test_smaller_swing_confirms_sooner() {
    let bars = double_bottom(104.0, 101.0);
    let frame = IndicatorFrame::new();
    let input = ExtractionInput::new(&bars, &frame);

    assert!(SupportResistanceExtractor::new("support_resistance")
        .levels_at(&input, 6)
        .is_empty());
    let levels = SupportResistanceExtractor::new("support_resistance")
        .with_swing_k(1)
        .levels_at(&input, 6);
    assert_eq!(levels.len(), 1);
    assert!(approx(levels[0].price, 100.0));
}
