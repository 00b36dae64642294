//! Environment-driven configuration. `.env` is loaded by the binaries via dotenvy.

use crate::error::ConfigError;
use crate::models::{Interval, Market};
use crate::signals::FusionWeights;
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_TOLERANCE: f64 = 0.001;
pub const DEFAULT_WARMUP_BARS: usize = 60;
pub const DEFAULT_LOOKBACK_DAYS: i64 = 30;

pub fn get_environment() -> String {
    env::var("ENVIRONMENT").unwrap_or_else(|_| "sandbox".to_string())
}

pub fn get_database_url() -> String {
    env::var("DATABASE_URL").unwrap_or_else(|_| {
        "host=localhost port=5432 user=postgres password=postgres dbname=stocksignal".to_string()
    })
}

pub fn get_port() -> u16 {
    env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080)
}

/// What a run does for each symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Fetch the trailing window, reconcile, recompute on change.
    #[default]
    Sync,
    /// Fetch the long range and backfill rows older than anything stored.
    ExpandHistory,
    /// Skip the feed and recompute indicators and composites from stored bars.
    IndicatorsOnly,
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "sync" => Ok(RunMode::Sync),
            "expand_history" | "expand" => Ok(RunMode::ExpandHistory),
            "indicators_only" | "indicators" => Ok(RunMode::IndicatorsOnly),
            other => Err(format!("unknown run mode '{}'", other)),
        }
    }
}

/// Knobs for one symbol's pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub market: Market,
    pub interval: Interval,
    pub lookback_days: i64,
    pub tolerance: f64,
    pub warmup_bars: usize,
    pub indicator_history_bars: usize,
    pub initial_history_days: i64,
    pub expand_history_days: i64,
    pub mode: RunMode,
    pub force_recompute: bool,
    pub provider_max_retries: usize,
    pub retry_min_delay: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            market: Market::default(),
            interval: Interval::default(),
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            tolerance: DEFAULT_TOLERANCE,
            warmup_bars: DEFAULT_WARMUP_BARS,
            indicator_history_bars: 500,
            initial_history_days: 365,
            expand_history_days: 3650,
            mode: RunMode::default(),
            force_recompute: false,
            provider_max_retries: 3,
            retry_min_delay: Duration::from_millis(500),
        }
    }
}

/// Everything the binaries need, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: String,
    pub database_url: String,
    pub db_pool_size: usize,
    pub symbols: Vec<String>,
    pub pipeline: PipelineConfig,
    pub concurrency: usize,
    pub symbol_timeout: Duration,
    pub provider_base_url: Option<String>,
    pub sync_cron: Option<String>,
    pub sync_interval_seconds: u64,
    pub weights: FusionWeights,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let pipeline = PipelineConfig {
            market: parse_var("MARKET", Market::default())?,
            interval: parse_var("INTERVAL", Interval::default())?,
            lookback_days: parse_positive("LOOKBACK_DAYS", DEFAULT_LOOKBACK_DAYS)?,
            tolerance: parse_tolerance()?,
            warmup_bars: parse_positive("WARMUP_BARS", DEFAULT_WARMUP_BARS)?,
            indicator_history_bars: parse_positive("INDICATOR_HISTORY_BARS", 500usize)?,
            initial_history_days: parse_positive("INITIAL_HISTORY_DAYS", 365i64)?,
            expand_history_days: parse_positive("EXPAND_HISTORY_DAYS", 3650i64)?,
            mode: parse_var("RUN_MODE", RunMode::default())?,
            force_recompute: parse_bool("FORCE_RECOMPUTE", false)?,
            provider_max_retries: parse_var("PROVIDER_MAX_RETRIES", 3usize)?,
            retry_min_delay: Duration::from_millis(500),
        };

        let weights = match env::var("SIGNAL_WEIGHTS_PATH") {
            Ok(path) if !path.trim().is_empty() => FusionWeights::from_json_file(Path::new(&path))?,
            _ => FusionWeights::standard(),
        };

        Ok(Self {
            environment: get_environment(),
            database_url: get_database_url(),
            db_pool_size: parse_positive("DB_POOL_SIZE", 4usize)?,
            symbols: parse_symbols(&env::var("SYMBOLS").unwrap_or_else(|_| "2330,2317".to_string())),
            pipeline,
            concurrency: parse_positive("WORKER_CONCURRENCY", 4usize)?,
            symbol_timeout: Duration::from_secs(parse_positive("SYMBOL_TIMEOUT_SECONDS", 120u64)?),
            provider_base_url: env::var("PROVIDER_BASE_URL").ok().filter(|u| !u.is_empty()),
            sync_cron: env::var("SYNC_CRON").ok().filter(|c| !c.trim().is_empty()),
            sync_interval_seconds: parse_var("SYNC_INTERVAL_SECONDS", 0u64)?,
            weights,
            port: parse_var("PORT", 8080u16)?,
        })
    }
}

/// Comma or whitespace separated, upper-cased, deduplicated, order kept.
pub fn parse_symbols(raw: &str) -> Vec<String> {
    let mut symbols: Vec<String> = Vec::new();
    for symbol in raw
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(|s| s.trim().to_ascii_uppercase())
        .filter(|s| !s.is_empty())
    {
        if !symbols.contains(&symbol) {
            symbols.push(symbol);
        }
    }
    symbols
}

fn parse_var<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => {
            value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                key,
                value,
                reason: e.to_string(),
            })
        }
        _ => Ok(default),
    }
}

fn parse_positive<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default + Copy + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    let value = parse_var(key, default)?;
    if value <= T::default() {
        return Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

fn parse_bool(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(key) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "" => Ok(default),
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                key,
                value,
                reason: "expected a boolean".to_string(),
            }),
        },
        Err(_) => Ok(default),
    }
}

fn parse_tolerance() -> Result<f64, ConfigError> {
    let tolerance: f64 = parse_var("PRICE_TOLERANCE", DEFAULT_TOLERANCE)?;
    if !tolerance.is_finite() || tolerance < 0.0 {
        return Err(ConfigError::Invalid {
            key: "PRICE_TOLERANCE",
            value: tolerance.to_string(),
            reason: "must be a non-negative number".to_string(),
        });
    }
    Ok(tolerance)
}
