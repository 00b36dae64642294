//! Weighted fusion of signal events into one composite score and action.

use crate::error::ConfigError;
use crate::models::{Action, CompositeSignal, SignalEvent, SignalKind};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;

pub const STRONG_BUY_THRESHOLD: f64 = 0.6;
pub const BUY_THRESHOLD: f64 = 0.2;
pub const SELL_THRESHOLD: f64 = -0.2;
pub const STRONG_SELL_THRESHOLD: f64 = -0.6;

/// Weight lookup: `(indicator, kind)` first, then indicator-wide, then `default`.
#[derive(Debug, Clone, PartialEq)]
pub struct FusionWeights {
    by_kind: HashMap<(String, SignalKind), f64>,
    by_indicator: HashMap<String, f64>,
    default: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            by_kind: HashMap::new(),
            by_indicator: HashMap::new(),
            default: 1.0,
        }
    }
}

/// On-disk shape of a weights override file.
///
/// ```json
/// { "default": 1.0, "indicators": { "ma_cross": 1.5 }, "kinds": { "ma_cross": { "CrossUp": 1.8 } } }
/// ```
#[derive(Debug, Default, Deserialize)]
struct WeightsFile {
    default: Option<f64>,
    #[serde(default)]
    indicators: HashMap<String, f64>,
    #[serde(default)]
    kinds: HashMap<String, HashMap<String, f64>>,
}

impl FusionWeights {
    /// Weights of the standard extractor set.
    pub fn standard() -> Self {
        [
            ("ma_cross", 1.5),
            ("ema_cross", 1.3),
            ("macd_cross", 1.4),
            ("kd_cross", 1.0),
            ("cci_zero_cross", 0.9),
            ("mom_zero_cross", 0.6),
            ("macd_divergence", 2.0),
            ("rsi_divergence", 1.2),
            ("price_anomaly", 1.0),
            ("volume_anomaly", 0.7),
            ("support_resistance", 1.0),
            ("rsi_zone", 1.2),
            ("rsi_near_zone", 0.4),
            ("kd_zone", 1.0),
            ("cci_zone", 0.9),
            ("willr_zone", 0.8),
            ("bollinger_break", 1.0),
            ("trend_bias", 0.5),
        ]
        .into_iter()
        .fold(Self::default(), |weights, (name, weight)| {
            weights.with_indicator(name, weight)
        })
    }

    pub fn with_indicator(mut self, indicator: impl Into<String>, weight: f64) -> Self {
        self.by_indicator.insert(indicator.into(), weight);
        self
    }

    pub fn with_kind(mut self, indicator: impl Into<String>, kind: SignalKind, weight: f64) -> Self {
        self.by_kind.insert((indicator.into(), kind), weight);
        self
    }

    pub fn weight(&self, indicator: &str, kind: SignalKind) -> f64 {
        self.by_kind
            .get(&(indicator.to_string(), kind))
            .or_else(|| self.by_indicator.get(indicator))
            .copied()
            .unwrap_or(self.default)
    }

    /// Standard weights overridden by the entries of a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        let file: WeightsFile = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: display.clone(),
            source,
        })?;

        let mut weights = Self::standard();
        if let Some(default) = file.default {
            weights.default = default;
        }
        for (indicator, weight) in file.indicators {
            weights = weights.with_indicator(indicator, weight);
        }
        for (indicator, kinds) in file.kinds {
            for (kind, weight) in kinds {
                let parsed = SignalKind::parse(&kind).ok_or_else(|| ConfigError::Invalid {
                    key: "SIGNAL_WEIGHTS_PATH",
                    value: kind.clone(),
                    reason: format!("unknown signal kind in {}", display),
                })?;
                weights = weights.with_kind(indicator.clone(), parsed, weight);
            }
        }
        Ok(weights)
    }
}

/// Fixed thresholds on the normalized score.
pub fn classify(score: f64) -> Action {
    if score >= STRONG_BUY_THRESHOLD {
        Action::StrongBuy
    } else if score >= BUY_THRESHOLD {
        Action::Buy
    } else if score <= STRONG_SELL_THRESHOLD {
        Action::StrongSell
    } else if score <= SELL_THRESHOLD {
        Action::Sell
    } else {
        Action::Hold
    }
}

fn canonical_order(a: &SignalEvent, b: &SignalEvent) -> Ordering {
    a.indicator_name
        .cmp(&b.indicator_name)
        .then(a.kind.cmp(&b.kind))
        .then(a.direction.cmp(&b.direction))
        .then(a.strength.total_cmp(&b.strength))
        .then(a.timestamp.cmp(&b.timestamp))
}

#[derive(Debug, Clone, Default)]
pub struct FusionScorer {
    weights: FusionWeights,
}

impl FusionScorer {
    pub fn new(weights: FusionWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &FusionWeights {
        &self.weights
    }

    /// Reduce the events of one `(symbol, timestamp)` to a composite.
    ///
    /// Score = Σ sign·strength·weight / Σ |strength·weight|, clamped to `[-1, 1]`.
    /// Events are summed in a canonical order so any permutation of the input
    /// gives a bit-identical result; that order is kept in `contributing_events`.
    pub fn fuse(
        &self,
        symbol: &str,
        timestamp: DateTime<Utc>,
        mut events: Vec<SignalEvent>,
    ) -> CompositeSignal {
        events.sort_by(canonical_order);

        let (weighted, total) = events.iter().fold((0.0, 0.0), |(weighted, total), event| {
            let magnitude = event.strength * self.weights.weight(&event.indicator_name, event.kind);
            (
                weighted + event.direction.sign() * magnitude,
                total + magnitude.abs(),
            )
        });

        let score = if total > 0.0 && total.is_finite() {
            (weighted / total).clamp(-1.0, 1.0)
        } else {
            0.0
        };

        CompositeSignal {
            symbol: symbol.to_string(),
            timestamp,
            score,
            action: classify(score),
            contributing_events: events,
        }
    }
}
