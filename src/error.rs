//! Error taxonomy for the sync and signal pipeline.
//!
//! Invariant violations (`ReconciliationError`, `AlignmentError`) are fatal for the
//! symbol they occur on and never retried. `ProviderError` is the only retryable class.

use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

/// Malformed reconciliation window.
#[derive(Debug, Error, PartialEq)]
pub enum ReconciliationError {
    #[error("{window} window for {symbol} is not sorted at index {index}: {previous} >= {current}")]
    Unsorted {
        symbol: String,
        window: &'static str,
        index: usize,
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },

    #[error("{window} window for {symbol} has duplicate timestamp {timestamp}")]
    DuplicateTimestamp {
        symbol: String,
        window: &'static str,
        timestamp: DateTime<Utc>,
    },

    #[error("{window} window for {expected} contains a bar for {found}")]
    ForeignSymbol {
        expected: String,
        found: String,
        window: &'static str,
    },
}

/// Indicator series that do not line up with the price series they were derived from.
#[derive(Debug, Error, PartialEq)]
pub enum AlignmentError {
    #[error("indicator {indicator} has {actual} values, expected {expected}")]
    LengthMismatch {
        indicator: String,
        expected: usize,
        actual: usize,
    },

    #[error("indicator {indicator} declares {fields} fields but carries {columns} columns")]
    FieldMismatch {
        indicator: String,
        fields: usize,
        columns: usize,
    },

    #[error("indicator {indicator} timestamp at index {index} is {actual}, expected {expected}")]
    TimestampMismatch {
        indicator: String,
        index: usize,
        expected: DateTime<Utc>,
        actual: DateTime<Utc>,
    },
}

/// Market data feed failures.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),

    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("rate limited by provider")]
    RateLimited,

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode provider response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Network failures, rate limiting and 5xx responses are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Network(_) | ProviderError::RateLimited => true,
            ProviderError::Status { status, .. } => *status >= 500,
            ProviderError::InvalidSymbol(_) | ProviderError::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderError::Decode(err.to_string())
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

/// Persistence failures.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection not available")]
    NotConnected,

    #[error("database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("failed to (de)serialize {what}: {source}")]
    Serialization {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("plan for {symbol} rejected: {reason}")]
    InvalidPlan { symbol: String, reason: String },

    #[error("corrupt row in {table}: {reason}")]
    CorruptRow { table: String, reason: String },
}

/// Invalid indicator calculator parameters.
#[derive(Debug, Error, PartialEq)]
pub enum IndicatorError {
    #[error("invalid parameter {param} = {value}: {reason}")]
    InvalidParam {
        param: &'static str,
        value: usize,
        reason: &'static str,
    },
}

/// Bad configuration value.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Per-symbol fatal outcome. One symbol's error never aborts the batch.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Reconciliation(#[from] ReconciliationError),

    #[error(transparent)]
    Alignment(#[from] AlignmentError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("provider returned no data for {0}")]
    NoData(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("cancelled before completion")]
    Cancelled,

    #[error("task failed: {0}")]
    TaskFailed(String),
}

impl PipelineError {
    /// Stable label for reports and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Reconciliation(_) => "reconciliation",
            PipelineError::Alignment(_) => "alignment",
            PipelineError::Provider(_) => "provider",
            PipelineError::Repository(_) => "repository",
            PipelineError::NoData(_) => "no_data",
            PipelineError::Timeout(_) => "timeout",
            PipelineError::Cancelled => "cancelled",
            PipelineError::TaskFailed(_) => "task_failed",
        }
    }
}

/// Non-fatal condition surfaced in a symbol report.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PipelineWarning {
    InsufficientHistory { required: usize, actual: usize },
}

impl std::fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineWarning::InsufficientHistory { required, actual } => write!(
                f,
                "insufficient history: {} bars, indicators need {}",
                actual, required
            ),
        }
    }
}
