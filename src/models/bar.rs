use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One OHLCV bar for a symbol, keyed by `(symbol, timestamp)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl PriceBar {
    pub fn new(
        symbol: impl Into<String>,
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

impl ta::Open for PriceBar {
    fn open(&self) -> f64 {
        self.open
    }
}

impl ta::High for PriceBar {
    fn high(&self) -> f64 {
        self.high
    }
}

impl ta::Low for PriceBar {
    fn low(&self) -> f64 {
        self.low
    }
}

impl ta::Close for PriceBar {
    fn close(&self) -> f64 {
        self.close
    }
}

impl ta::Volume for PriceBar {
    fn volume(&self) -> f64 {
        self.volume as f64
    }
}

/// Bar interval served by the feed. Every interval is stored in its own tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "1wk")]
    OneWeek,
    #[serde(rename = "1mo")]
    OneMonth,
}

impl Interval {
    pub fn code(&self) -> &'static str {
        match self {
            Interval::OneMinute => "1m",
            Interval::FiveMinutes => "5m",
            Interval::FifteenMinutes => "15m",
            Interval::ThirtyMinutes => "30m",
            Interval::OneHour => "1h",
            Interval::OneDay => "1d",
            Interval::OneWeek => "1wk",
            Interval::OneMonth => "1mo",
        }
    }

    /// Longest history the feed serves for this interval, `None` when unbounded.
    pub fn max_history(&self) -> Option<Duration> {
        match self {
            Interval::OneMinute => Some(Duration::days(7)),
            Interval::FiveMinutes | Interval::FifteenMinutes | Interval::ThirtyMinutes => {
                Some(Duration::days(60))
            }
            Interval::OneHour => Some(Duration::days(730)),
            Interval::OneDay | Interval::OneWeek | Interval::OneMonth => None,
        }
    }

    pub fn is_intraday(&self) -> bool {
        self.max_history().is_some()
    }
}

impl Default for Interval {
    fn default() -> Self {
        Interval::OneDay
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1m" => Ok(Interval::OneMinute),
            "5m" => Ok(Interval::FiveMinutes),
            "15m" => Ok(Interval::FifteenMinutes),
            "30m" => Ok(Interval::ThirtyMinutes),
            "1h" | "60m" => Ok(Interval::OneHour),
            "1d" => Ok(Interval::OneDay),
            "1wk" => Ok(Interval::OneWeek),
            "1mo" => Ok(Interval::OneMonth),
            other => Err(format!("unknown interval '{}'", other)),
        }
    }
}

/// Market a symbol trades on; decides how the symbol is spelled for the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    Tw,
    Us,
    Other,
}

impl Market {
    /// Feed tickers to try, in order. Taiwan listings fall back from `.TW` to `.TWO` (OTC).
    pub fn feed_symbols(&self, symbol: &str) -> Vec<String> {
        let symbol = symbol.trim();
        let passthrough = symbol.contains('.')
            || symbol.starts_with('^')
            || symbol.contains('=')
            || symbol.contains('-');
        match self {
            Market::Us | Market::Other => vec![symbol.to_string()],
            Market::Tw if passthrough => vec![symbol.to_string()],
            Market::Tw if symbol.len() == 4 && symbol.chars().all(|c| c.is_ascii_digit()) => {
                vec![format!("{}.TW", symbol), format!("{}.TWO", symbol)]
            }
            Market::Tw if symbol.len() <= 5 && symbol.chars().any(|c| c.is_ascii_alphabetic()) => {
                vec![symbol.to_string()]
            }
            Market::Tw => vec![format!("{}.TW", symbol)],
        }
    }
}

impl Default for Market {
    fn default() -> Self {
        Market::Tw
    }
}

impl FromStr for Market {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tw" => Ok(Market::Tw),
            "us" => Ok(Market::Us),
            "etf" | "index" | "forex" | "crypto" | "futures" | "other" => Ok(Market::Other),
            other => Err(format!("unknown market '{}'", other)),
        }
    }
}
