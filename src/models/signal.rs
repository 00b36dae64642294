use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of signal kinds. Extractors construct variants directly and the scorer
/// keys weights on them, so the only string mapping is `as_str`/`parse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SignalKind {
    CrossUp,
    CrossDown,
    Divergence,
    Anomaly,
    SupportTouch,
    ResistanceTouch,
    /// Oscillator at or beyond its upper zone edge, or approaching it.
    Overbought,
    Oversold,
    /// Close outside a volatility band.
    BandBreak,
    /// Close above or below a trend baseline.
    TrendBias,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::CrossUp => "CrossUp",
            SignalKind::CrossDown => "CrossDown",
            SignalKind::Divergence => "Divergence",
            SignalKind::Anomaly => "Anomaly",
            SignalKind::SupportTouch => "SupportTouch",
            SignalKind::ResistanceTouch => "ResistanceTouch",
            SignalKind::Overbought => "Overbought",
            SignalKind::Oversold => "Oversold",
            SignalKind::BandBreak => "BandBreak",
            SignalKind::TrendBias => "TrendBias",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "CrossUp" => Some(SignalKind::CrossUp),
            "CrossDown" => Some(SignalKind::CrossDown),
            "Divergence" => Some(SignalKind::Divergence),
            "Anomaly" => Some(SignalKind::Anomaly),
            "SupportTouch" => Some(SignalKind::SupportTouch),
            "ResistanceTouch" => Some(SignalKind::ResistanceTouch),
            "Overbought" => Some(SignalKind::Overbought),
            "Oversold" => Some(SignalKind::Oversold),
            "BandBreak" => Some(SignalKind::BandBreak),
            "TrendBias" => Some(SignalKind::TrendBias),
            _ => None,
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SignalDirection {
    Bullish,
    Bearish,
    Neutral,
}

impl SignalDirection {
    pub fn sign(&self) -> f64 {
        match self {
            SignalDirection::Bullish => 1.0,
            SignalDirection::Bearish => -1.0,
            SignalDirection::Neutral => 0.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalDirection::Bullish => "Bullish",
            SignalDirection::Bearish => "Bearish",
            SignalDirection::Neutral => "Neutral",
        }
    }

    pub fn from_sign(value: f64) -> Self {
        if value > 0.0 {
            SignalDirection::Bullish
        } else if value < 0.0 {
            SignalDirection::Bearish
        } else {
            SignalDirection::Neutral
        }
    }
}

/// One detector hit at one bar. Strength is always within `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    pub timestamp: DateTime<Utc>,
    pub indicator_name: String,
    pub kind: SignalKind,
    pub strength: f64,
    pub direction: SignalDirection,
}

impl SignalEvent {
    pub fn new(
        timestamp: DateTime<Utc>,
        indicator_name: impl Into<String>,
        kind: SignalKind,
        strength: f64,
        direction: SignalDirection,
    ) -> Self {
        let strength = if strength.is_finite() {
            strength.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            timestamp,
            indicator_name: indicator_name.into(),
            kind,
            strength,
            direction,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::StrongBuy => "StrongBuy",
            Action::Buy => "Buy",
            Action::Hold => "Hold",
            Action::Sell => "Sell",
            Action::StrongSell => "StrongSell",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "StrongBuy" => Some(Action::StrongBuy),
            "Buy" => Some(Action::Buy),
            "Hold" => Some(Action::Hold),
            "Sell" => Some(Action::Sell),
            "StrongSell" => Some(Action::StrongSell),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fused result for one `(symbol, timestamp)`. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeSignal {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub score: f64,
    pub action: Action,
    pub contributing_events: Vec<SignalEvent>,
}
