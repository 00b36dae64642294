//! Unit tests for weighted signal fusion

use crate::support::{approx, day, SYMBOL};
use stocksignal::models::{Action, SignalDirection, SignalEvent, SignalKind};
use stocksignal::signals::{classify, FusionScorer, FusionWeights};

fn event(name: &str, kind: SignalKind, strength: f64, direction: SignalDirection) -> SignalEvent {
    SignalEvent::new(day(1), name, kind, strength, direction)
}

fn mixed_events() -> Vec<SignalEvent> {
    vec![
        event("ma_cross", SignalKind::CrossUp, 0.7, SignalDirection::Bullish),
        event("rsi_divergence", SignalKind::Divergence, 0.55, SignalDirection::Bearish),
        event("volume_anomaly", SignalKind::Anomaly, 0.3, SignalDirection::Bullish),
        event("macd_cross", SignalKind::CrossDown, 0.1, SignalDirection::Bearish),
        event("support_resistance", SignalKind::SupportTouch, 0.9, SignalDirection::Bullish),
    ]
}

#[test]
fn test_no_events_is_hold() {
    let composite = FusionScorer::default().fuse(SYMBOL, day(1), Vec::new());
    assert_eq!(composite.score, 0.0);
    assert_eq!(composite.action, Action::Hold);
    assert!(composite.contributing_events.is_empty());
    assert_eq!(composite.symbol, SYMBOL);
}

#[test]
fn test_opposing_events_net_out() {
    let events = vec![
        event("a", SignalKind::CrossUp, 0.8, SignalDirection::Bullish),
        event("b", SignalKind::CrossDown, 0.3, SignalDirection::Bearish),
    ];
    let composite = FusionScorer::new(FusionWeights::default()).fuse(SYMBOL, day(1), events);
    assert!(approx(composite.score, 0.5 / 1.1));
    assert_eq!(composite.action, Action::Buy);
}

#[test]
fn test_permutations_fuse_identically() {
    let scorer = FusionScorer::new(FusionWeights::standard());
    let forward = scorer.fuse(SYMBOL, day(1), mixed_events());
    let mut reversed_events = mixed_events();
    reversed_events.reverse();
    let reversed = scorer.fuse(SYMBOL, day(1), reversed_events);
    let mut rotated_events = mixed_events();
    rotated_events.rotate_left(2);
    let rotated = scorer.fuse(SYMBOL, day(1), rotated_events);

    assert_eq!(forward.score.to_bits(), reversed.score.to_bits());
    assert_eq!(forward.score.to_bits(), rotated.score.to_bits());
    assert_eq!(forward.contributing_events, reversed.contributing_events);
    assert_eq!(forward, rotated);
}

#[test]
fn test_score_bounded() {
    let composite = FusionScorer::new(FusionWeights::standard()).fuse(SYMBOL, day(1), mixed_events());
    assert!((-1.0..=1.0).contains(&composite.score));
    let all_bull = vec![
        event("a", SignalKind::CrossUp, 1.0, SignalDirection::Bullish),
        event("b", SignalKind::Anomaly, 0.2, SignalDirection::Bullish),
    ];
    let composite = FusionScorer::default().fuse(SYMBOL, day(1), all_bull);
    assert!(approx(composite.score, 1.0));
    assert_eq!(composite.action, Action::StrongBuy);
}

#[test]
fn test_neutral_events_dilute_score() {
    let events = vec![
        event("a", SignalKind::CrossUp, 0.5, SignalDirection::Bullish),
        event("b", SignalKind::Anomaly, 0.5, SignalDirection::Neutral),
    ];
    let composite = FusionScorer::default().fuse(SYMBOL, day(1), events);
    assert!(approx(composite.score, 0.5));
}

#[test]
fn test_weights_shift_the_balance() {
    let weights = FusionWeights::default().with_indicator("a", 3.0);
    let events = vec![
        event("a", SignalKind::CrossUp, 0.5, SignalDirection::Bullish),
        event("b", SignalKind::CrossDown, 0.5, SignalDirection::Bearish),
    ];
    let composite = FusionScorer::new(weights).fuse(SYMBOL, day(1), events);
    assert!(approx(composite.score, 0.5));
    assert_eq!(composite.action, Action::Buy);
}

#[test]
fn test_weight_lookup_precedence() {
    let weights = FusionWeights::default()
        .with_indicator("ma_cross", 1.5)
        .with_kind("ma_cross", SignalKind::CrossDown, 0.5);
    assert_eq!(weights.weight("ma_cross", SignalKind::CrossDown), 0.5);
    assert_eq!(weights.weight("ma_cross", SignalKind::CrossUp), 1.5);
    assert_eq!(weights.weight("unknown", SignalKind::CrossUp), 1.0);
}

#[test]
fn test_classify_thresholds() {
    assert_eq!(classify(0.6), Action::StrongBuy);
    assert_eq!(classify(0.2), Action::Buy);
    assert_eq!(classify(0.19), Action::Hold);
    assert_eq!(classify(0.0), Action::Hold);
    assert_eq!(classify(-0.2), Action::Sell);
    assert_eq!(classify(-0.6), Action::StrongSell);
}

#[test]
fn test_event_strength_is_clamped() {
    assert_eq!(event("a", SignalKind::Anomaly, 3.0, SignalDirection::Bullish).strength, 1.0);
    assert_eq!(event("a", SignalKind::Anomaly, f64::NAN, SignalDirection::Bullish).strength, 0.0);
}

#[test]
fn test_weights_file_overrides_standard() {
    let path = std::env::temp_dir().join(format!("stocksignal-weights-{}.json", std::process::id()));
    std::fs::write(
        &path,
        r#"{ "default": 0.5, "indicators": { "ma_cross": 2.5 }, "kinds": { "kd_cross": { "CrossUp": 0.1 } } }"#,
    )
    .unwrap();
    let weights = FusionWeights::from_json_file(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(weights.weight("ma_cross", SignalKind::CrossUp), 2.5);
    assert_eq!(weights.weight("kd_cross", SignalKind::CrossUp), 0.1);
    assert_eq!(weights.weight("kd_cross", SignalKind::CrossDown), 1.0);
    assert_eq!(weights.weight("macd_divergence", SignalKind::Divergence), 2.0);
    assert_eq!(weights.weight("custom", SignalKind::Anomaly), 0.5);
}

#[test]
fn test_weights_file_rejects_unknown_kind() {
    let path = std::env::temp_dir().join(format!("stocksignal-bad-weights-{}.json", std::process::id()));
    std::fs::write(&path, r#"{ "kinds": { "ma_cross": { "Sideways": 1.0 } } }"#).unwrap();
    let result = FusionWeights::from_json_file(&path);
    std::fs::remove_file(&path).ok();
    assert!(result.is_err());
}

#[test]
fn test_weights_file_accepts_zone_kinds() {
    let path = std::env::temp_dir().join(format!("stocksignal-zone-weights-{}.json", std::process::id()));
    std::fs::write(
        &path,
        r#"{ "kinds": { "rsi_zone": { "Oversold": 2.0 }, "bollinger_break": { "BandBreak": 0.3 }, "trend_bias": { "TrendBias": 0.2 } } }"#,
    )
    .unwrap();
    let weights = FusionWeights::from_json_file(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(weights.weight("rsi_zone", SignalKind::Oversold), 2.0);
    assert_eq!(weights.weight("rsi_zone", SignalKind::Overbought), 1.2);
    assert_eq!(weights.weight("bollinger_break", SignalKind::BandBreak), 0.3);
    assert_eq!(weights.weight("trend_bias", SignalKind::TrendBias), 0.2);
}

#[test]
fn test_kind_names_parse_back() {
    for kind in [
        SignalKind::CrossUp,
        SignalKind::CrossDown,
        SignalKind::Divergence,
        SignalKind::Anomaly,
        SignalKind::SupportTouch,
        SignalKind::ResistanceTouch,
        SignalKind::Overbought,
        SignalKind::Oversold,
        SignalKind::BandBreak,
        SignalKind::TrendBias,
    ] {
        assert_eq!(SignalKind::parse(kind.as_str()), Some(kind));
    }
}
