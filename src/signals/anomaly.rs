//! Return and volume outliers against a trailing window.

use crate::common::math::trailing_mean_std;
use crate::models::{SignalDirection, SignalEvent, SignalKind};
use crate::signals::extractor::{ExtractionInput, SignalExtractor};

pub const DEFAULT_ANOMALY_WINDOW: usize = 20;
pub const DEFAULT_ANOMALY_THRESHOLD: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnomalyMetric {
    /// Close-to-close simple return.
    Return,
    Volume,
}

/// Flags a bar whose metric sits more than `threshold` sample deviations away
/// from the mean of the previous `window` bars (the current bar excluded).
#[derive(Debug, Clone)]
pub struct AnomalyExtractor {
    name: String,
    metric: AnomalyMetric,
    window: usize,
    threshold: f64,
}

impl AnomalyExtractor {
    pub fn new(name: impl Into<String>, metric: AnomalyMetric) -> Self {
        Self {
            name: name.into(),
            metric,
            window: DEFAULT_ANOMALY_WINDOW,
            threshold: DEFAULT_ANOMALY_THRESHOLD,
        }
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }
}

impl SignalExtractor for AnomalyExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    fn extract(&self, input: &ExtractionInput<'_>, index: usize) -> Vec<SignalEvent> {
        let series = match self.metric {
            AnomalyMetric::Return => &input.returns,
            AnomalyMetric::Volume => &input.volume,
        };
        let (Some(&value), Some(timestamp)) = (series.get(index), input.timestamp(index)) else {
            return Vec::new();
        };
        if !value.is_finite() {
            return Vec::new();
        }
        let Some((mean, std)) = trailing_mean_std(series, index, self.window) else {
            return Vec::new();
        };
        if !std.is_finite() || std <= 0.0 {
            return Vec::new();
        }

        let z = (value - mean) / std;
        if z.abs() <= self.threshold {
            return Vec::new();
        }
        let strength = (z.abs() / (2.0 * self.threshold)).min(1.0);
        vec![SignalEvent::new(
            timestamp,
            self.name.clone(),
            SignalKind::Anomaly,
            strength,
            SignalDirection::from_sign(z),
        )]
    }
}
