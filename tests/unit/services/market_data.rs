//! Unit tests for market-aware fetching

use crate::core_scripted::ScriptedProvider;
use crate::support::wave_bars;
use chrono::{Duration, TimeZone, Utc};
use std::time::Duration as StdDuration;
use stocksignal::error::ProviderError;
use stocksignal::models::{Interval, Market};
use stocksignal::services::{fetch_symbol, FetchRange, RetryPolicy};

fn policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: 0,
        min_delay: StdDuration::from_millis(1),
        max_delay: StdDuration::from_millis(5),
    }
}

fn range() -> FetchRange {
    let end = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    FetchRange::new(end - Duration::days(30), end)
}

#[tokio::test]
async fn test_otc_fallback_relabels_bars() {
    let start = Utc.with_ymd_and_hms(2024, 2, 10, 0, 0, 0).unwrap();
    let provider = ScriptedProvider::new()
        .invalid("6488.TW")
        .with_bars("6488.TWO", wave_bars("6488.TWO", start, 5));

    let fetched = fetch_symbol(&provider, Market::Tw, "6488", Interval::OneDay, range(), policy())
        .await
        .unwrap();
    assert_eq!(fetched.ticker, "6488.TWO");
    assert_eq!(fetched.bars.len(), 5);
    assert!(fetched.bars.iter().all(|b| b.symbol == "6488"));
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn test_empty_primary_listing_tries_next() {
    let start = Utc.with_ymd_and_hms(2024, 2, 10, 0, 0, 0).unwrap();
    let provider = ScriptedProvider::new().with_bars("6488.TWO", wave_bars("6488.TWO", start, 3));
    let fetched = fetch_symbol(&provider, Market::Tw, "6488", Interval::OneDay, range(), policy())
        .await
        .unwrap();
    assert_eq!(fetched.ticker, "6488.TWO");
}

#[tokio::test]
async fn test_all_spellings_rejected_is_invalid_symbol() {
    let provider = ScriptedProvider::new().invalid("9999.TW").invalid("9999.TWO");
    let err = fetch_symbol(&provider, Market::Tw, "9999", Interval::OneDay, range(), policy())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::InvalidSymbol(_)));
}

#[tokio::test]
async fn test_no_data_anywhere_is_empty() {
    let provider = ScriptedProvider::new();
    let fetched = fetch_symbol(&provider, Market::Us, "AAPL", Interval::OneDay, range(), policy())
        .await
        .unwrap();
    assert!(fetched.bars.is_empty());
    assert_eq!(fetched.ticker, "AAPL");
}

#[tokio::test]
async fn test_non_retryable_error_stops_immediately() {
    let provider = ScriptedProvider::new().broken("2330.TW");
    let retrying = RetryPolicy {
        max_retries: 3,
        ..policy()
    };
    let err = fetch_symbol(&provider, Market::Tw, "2330", Interval::OneDay, range(), retrying)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Decode(_)));
    assert_eq!(provider.calls(), 1);
}

#[test]
fn test_retryable_classification() {
    assert!(ProviderError::RateLimited.is_retryable());
    assert!(ProviderError::Network("reset".into()).is_retryable());
    assert!(ProviderError::Status { status: 502, body: String::new() }.is_retryable());
    assert!(!ProviderError::Status { status: 400, body: String::new() }.is_retryable());
    assert!(!ProviderError::InvalidSymbol("X".into()).is_retryable());
}
