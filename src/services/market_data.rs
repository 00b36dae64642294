//! Market data provider interface and the fetch policy around it.

use crate::error::ProviderError;
use crate::models::{Interval, Market, PriceBar};
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, warn};

/// Half-open request range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl FetchRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Pull `start` forward so the range never exceeds what the feed serves for `interval`.
    pub fn clamp_to(self, interval: Interval) -> Self {
        match interval.max_history() {
            Some(max) if self.end - self.start > max => Self {
                start: self.end - max,
                end: self.end,
            },
            _ => self,
        }
    }
}

#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Bars for one feed ticker, sorted ascending. Empty means the feed had nothing.
    async fn fetch_bars(
        &self,
        ticker: &str,
        interval: Interval,
        range: FetchRange,
    ) -> Result<Vec<PriceBar>, ProviderError>;
}

/// Retry budget for retryable provider errors.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

/// Result of a market-aware fetch: the ticker that answered and its bars,
/// relabelled with the stored symbol.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub ticker: String,
    pub bars: Vec<PriceBar>,
}

/// Fetch `symbol` trying each feed spelling for `market` in turn.
///
/// Each spelling is retried with exponential backoff on retryable errors. An empty
/// answer or an invalid-symbol error moves on to the next spelling; any other
/// error is returned as is. All spellings empty yields an empty `Fetched`.
pub async fn fetch_symbol(
    provider: &dyn MarketDataProvider,
    market: Market,
    symbol: &str,
    interval: Interval,
    range: FetchRange,
    policy: RetryPolicy,
) -> Result<Fetched, ProviderError> {
    let range = range.clamp_to(interval);
    let tickers = market.feed_symbols(symbol);
    let mut rejected = Vec::new();

    for ticker in &tickers {
        let attempt = (|| async { provider.fetch_bars(ticker, interval, range).await })
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(policy.min_delay)
                    .with_max_delay(policy.max_delay)
                    .with_max_times(policy.max_retries),
            )
            .when(|e: &ProviderError| e.is_retryable())
            .notify(|e: &ProviderError, delay: Duration| {
                warn!(
                    provider = provider.name(),
                    ticker = %ticker,
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "fetch failed for {}, retrying",
                    ticker
                );
            })
            .await;

        match attempt {
            Ok(bars) if !bars.is_empty() => {
                debug!(symbol = %symbol, ticker = %ticker, bars = bars.len(), "fetched {} bars", bars.len());
                let bars = bars
                    .into_iter()
                    .map(|mut bar| {
                        bar.symbol = symbol.to_string();
                        bar
                    })
                    .collect();
                return Ok(Fetched {
                    ticker: ticker.clone(),
                    bars,
                });
            }
            Ok(_) => {
                debug!(symbol = %symbol, ticker = %ticker, "no data for {}", ticker);
            }
            Err(ProviderError::InvalidSymbol(reason)) => {
                debug!(symbol = %symbol, ticker = %ticker, reason = %reason, "feed rejected {}", ticker);
                rejected.push(reason);
            }
            Err(e) => return Err(e),
        }
    }

    // Every spelling rejected outright is a symbol problem, not an empty feed.
    if !tickers.is_empty() && rejected.len() == tickers.len() {
        return Err(ProviderError::InvalidSymbol(rejected.join("; ")));
    }
    Ok(Fetched {
        ticker: tickers.into_iter().next().unwrap_or_else(|| symbol.to_string()),
        bars: Vec::new(),
    })
}
