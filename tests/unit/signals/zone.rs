//! Unit tests for zone, band and trend extractors

use crate::support::{approx, closes, frame};
use stocksignal::models::{SeriesRef, SignalDirection, SignalKind};
use stocksignal::signals::{
    ExtractionInput, FusionWeights, GapNormalizer, SignalExtractor, TrendExtractor, ZoneExtractor,
};

fn rsi_zone() -> ZoneExtractor {
    ZoneExtractor::oscillator("rsi_zone", SeriesRef::scalar("rsi"), 70.0, 30.0)
}

#[test]
fn test_oscillator_zones_fire_while_beyond_edges() {
    let bars = closes(&[10.0; 5]);
    let frame = frame(&bars, &[("rsi", vec![75.0, 50.0, 25.0, 70.0, f64::NAN])]);
    let input = ExtractionInput::new(&bars, &frame);
    let extractor = rsi_zone();

    let overbought = extractor.extract(&input, 0);
    assert_eq!(overbought.len(), 1);
    assert_eq!(overbought[0].kind, SignalKind::Overbought);
    assert_eq!(overbought[0].direction, SignalDirection::Bearish);
    assert_eq!(overbought[0].indicator_name, "rsi_zone");
    assert!(approx(overbought[0].strength, 0.625));

    assert!(extractor.extract(&input, 1).is_empty());

    let oversold = extractor.extract(&input, 2);
    assert_eq!(oversold[0].kind, SignalKind::Oversold);
    assert_eq!(oversold[0].direction, SignalDirection::Bullish);
    assert!(approx(oversold[0].strength, 0.625));

    // on the edge counts as inside the zone
    let edge = extractor.extract(&input, 3);
    assert_eq!(edge[0].kind, SignalKind::Overbought);
    assert!(approx(edge[0].strength, 0.5));

    assert!(extractor.extract(&input, 4).is_empty(), "warm-up yields nothing");
}

#[test]
fn test_approaching_zone_stops_at_the_edge() {
    let bars = closes(&[10.0; 5]);
    let frame = frame(&bars, &[("rsi", vec![67.0, 69.0, 70.0, 32.0, 36.0])]);
    let input = ExtractionInput::new(&bars, &frame);
    let extractor = rsi_zone().approaching(5.0);

    let far = extractor.extract(&input, 0);
    assert_eq!(far[0].kind, SignalKind::Overbought);
    assert_eq!(far[0].direction, SignalDirection::Bearish);
    assert!(approx(far[0].strength, 0.35));
    assert!(approx(extractor.extract(&input, 1)[0].strength, 0.45));

    assert!(extractor.extract(&input, 2).is_empty(), "inside the zone is not approaching");

    let low = extractor.extract(&input, 3);
    assert_eq!(low[0].kind, SignalKind::Oversold);
    assert_eq!(low[0].direction, SignalDirection::Bullish);
    assert!(approx(low[0].strength, 0.4));

    assert!(extractor.extract(&input, 4).is_empty());
}

#[test]
fn test_kd_zone_needs_both_lines() {
    let bars = closes(&[10.0; 3]);
    let frame = frame(
        &bars,
        &[("k", vec![85.0, 85.0, 15.0]), ("d", vec![82.0, 75.0, 10.0])],
    );
    let input = ExtractionInput::new(&bars, &frame);
    let extractor = ZoneExtractor::oscillator("kd_zone", SeriesRef::scalar("k"), 80.0, 20.0)
        .with_line(SeriesRef::scalar("d"));

    let high = extractor.extract(&input, 0);
    assert_eq!(high[0].kind, SignalKind::Overbought);
    assert!(approx(high[0].strength, 0.5 + 2.0 / 60.0));

    assert!(extractor.extract(&input, 1).is_empty());

    let low = extractor.extract(&input, 2);
    assert_eq!(low[0].kind, SignalKind::Oversold);
    assert!(approx(low[0].strength, 0.5 + 5.0 / 60.0));
}

#[test]
fn test_williams_r_negative_levels() {
    let bars = closes(&[10.0; 3]);
    let frame = frame(&bars, &[("willr", vec![-10.0, -50.0, -90.0])]);
    let input = ExtractionInput::new(&bars, &frame);
    let extractor = ZoneExtractor::oscillator("willr_zone", SeriesRef::scalar("willr"), -20.0, -80.0);

    let high = extractor.extract(&input, 0);
    assert_eq!(high[0].kind, SignalKind::Overbought);
    assert!(approx(high[0].strength, 0.5 + 10.0 / 60.0));
    assert!(extractor.extract(&input, 1).is_empty());
    assert_eq!(extractor.extract(&input, 2)[0].kind, SignalKind::Oversold);
}

#[test]
fn test_band_break_reads_close_against_band() {
    let bars = closes(&[106.0, 100.0, 93.0, 120.0]);
    let frame = frame(
        &bars,
        &[
            ("upper", vec![105.0, 105.0, 105.0, f64::NAN]),
            ("lower", vec![95.0, 95.0, 95.0, f64::NAN]),
        ],
    );
    let input = ExtractionInput::new(&bars, &frame);
    let extractor = ZoneExtractor::band(
        "bollinger_break",
        SeriesRef::scalar("upper"),
        SeriesRef::scalar("lower"),
    );

    let above = extractor.extract(&input, 0);
    assert_eq!(above[0].kind, SignalKind::BandBreak);
    assert_eq!(above[0].direction, SignalDirection::Bearish);
    assert!(approx(above[0].strength, 0.6));

    assert!(extractor.extract(&input, 1).is_empty());

    let below = extractor.extract(&input, 2);
    assert_eq!(below[0].kind, SignalKind::BandBreak);
    assert_eq!(below[0].direction, SignalDirection::Bullish);
    assert!(approx(below[0].strength, 0.7));

    assert!(extractor.extract(&input, 3).is_empty(), "no band during warm-up");
}

#[test]
fn test_trend_bias_follows_close_versus_baseline() {
    let bars = closes(&[102.0, 100.0, 97.0, 110.0]);
    let frame = frame(
        &bars,
        &[
            ("ma20", vec![100.0; 4]),
            ("atr", vec![4.0, 4.0, 4.0, f64::NAN]),
        ],
    );
    let input = ExtractionInput::new(&bars, &frame);
    let extractor = TrendExtractor::new(
        "trend_bias",
        SeriesRef::scalar("ma20"),
        GapNormalizer::Volatility(SeriesRef::scalar("atr")),
    );

    let up = extractor.extract(&input, 0);
    assert_eq!(up[0].kind, SignalKind::TrendBias);
    assert_eq!(up[0].direction, SignalDirection::Bullish);
    assert!(approx(up[0].strength, 0.5));

    assert!(extractor.extract(&input, 1).is_empty());

    let down = extractor.extract(&input, 2);
    assert_eq!(down[0].direction, SignalDirection::Bearish);
    assert!(approx(down[0].strength, 0.75));

    assert!(extractor.extract(&input, 3).is_empty(), "missing ATR skips the event");
}

#[test]
fn test_zone_weights_in_standard_set() {
    let weights = FusionWeights::standard();
    assert_eq!(weights.weight("rsi_zone", SignalKind::Oversold), 1.2);
    assert_eq!(weights.weight("rsi_near_zone", SignalKind::Overbought), 0.4);
    assert_eq!(weights.weight("willr_zone", SignalKind::Overbought), 0.8);
    assert_eq!(weights.weight("trend_bias", SignalKind::TrendBias), 0.5);
}
