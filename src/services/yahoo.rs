//! Yahoo Finance chart API (`/v8/finance/chart/{ticker}`) provider.

use crate::error::ProviderError;
use crate::models::{Interval, PriceBar};
use crate::services::market_data::{FetchRange, MarketDataProvider};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::time::Duration as StdDuration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

pub struct YahooChartProvider {
    client: reqwest::Client,
    base_url: String,
}

impl YahooChartProvider {
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(10))
            .user_agent("Mozilla/5.0 (compatible; stocksignal/0.1)")
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn parse(ticker: &str, interval: Interval, body: ChartEnvelope) -> Result<Vec<PriceBar>, ProviderError> {
        if let Some(error) = body.chart.error {
            return Err(classify_chart_error(ticker, error));
        }
        let Some(result) = body.chart.result.and_then(|r| r.into_iter().next()) else {
            return Ok(Vec::new());
        };
        let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
        let offset = Duration::seconds(result.meta.gmtoffset);

        let mut bars: Vec<PriceBar> = Vec::with_capacity(result.timestamp.len());
        for (i, ts) in result.timestamp.iter().enumerate() {
            let field = |col: &Vec<Option<f64>>| col.get(i).copied().flatten();
            let (Some(open), Some(high), Some(low), Some(close)) = (
                field(&quote.open),
                field(&quote.high),
                field(&quote.low),
                field(&quote.close),
            ) else {
                continue;
            };
            let Some(timestamp) = DateTime::<Utc>::from_timestamp(*ts, 0) else {
                return Err(ProviderError::Decode(format!("timestamp {} out of range", ts)));
            };
            let timestamp = if interval.is_intraday() {
                timestamp
            } else {
                session_date(timestamp, offset)
            };
            let volume = field(&quote.volume).unwrap_or(0.0).max(0.0).round() as u64;
            bars.push(PriceBar::new(ticker, timestamp, open, high, low, close, volume));
        }

        bars.sort_by_key(|b| b.timestamp);
        // the live bar can repeat the last completed one; keep the newest
        bars.reverse();
        bars.dedup_by_key(|b| b.timestamp);
        bars.reverse();
        Ok(bars)
    }
}

/// Daily and longer bars are keyed by the exchange-local session date at midnight UTC.
fn session_date(timestamp: DateTime<Utc>, gmtoffset: Duration) -> DateTime<Utc> {
    let local = (timestamp + gmtoffset).timestamp();
    DateTime::<Utc>::from_timestamp(local.div_euclid(86_400) * 86_400, 0).unwrap_or(timestamp)
}

fn classify_chart_error(ticker: &str, error: ChartError) -> ProviderError {
    let description = error.description.unwrap_or_default();
    match error.code.as_str() {
        "Not Found" => ProviderError::InvalidSymbol(format!("{}: {}", ticker, description)),
        "Too Many Requests" => ProviderError::RateLimited,
        code => ProviderError::Decode(format!("{}: {} {}", ticker, code, description)),
    }
}

#[async_trait]
impl MarketDataProvider for YahooChartProvider {
    fn name(&self) -> &str {
        "yahoo"
    }

    async fn fetch_bars(
        &self,
        ticker: &str,
        interval: Interval,
        range: FetchRange,
    ) -> Result<Vec<PriceBar>, ProviderError> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, ticker);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("period1", range.start.timestamp().to_string()),
                ("period2", range.end.timestamp().to_string()),
                ("interval", interval.code().to_string()),
                ("events", "history".to_string()),
                ("includeAdjustedClose", "false".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited);
        }
        let text = response.text().await?;

        // 404 carries a chart error body naming the unknown symbol
        if !status.is_success() && status.as_u16() != 404 {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: text.chars().take(200).collect(),
            });
        }

        let body: ChartEnvelope = serde_json::from_str(&text).map_err(|e| {
            if status.as_u16() == 404 {
                ProviderError::InvalidSymbol(ticker.to_string())
            } else {
                ProviderError::Decode(e.to_string())
            }
        })?;
        let bars = Self::parse(ticker, interval, body)?;
        debug!(ticker = %ticker, interval = %interval, bars = bars.len(), "chart response parsed");
        Ok(bars)
    }
}
