//! Runs every extractor over an aligned bar/indicator set and fuses the results.

use crate::error::AlignmentError;
use crate::models::{CompositeSignal, IndicatorFrame, PriceBar, SeriesRef, SignalEvent};
use crate::signals::anomaly::{AnomalyExtractor, AnomalyMetric};
use crate::signals::crossing::{CrossReference, CrossingExtractor, GapNormalizer};
use crate::signals::divergence::DivergenceExtractor;
use crate::signals::extractor::{ExtractionInput, SignalExtractor};
use crate::signals::fusion::{FusionScorer, FusionWeights};
use crate::signals::support_resistance::SupportResistanceExtractor;
use crate::signals::zone::{TrendExtractor, ZoneExtractor};
use chrono::{DateTime, Utc};

pub struct SignalEngine {
    extractors: Vec<Box<dyn SignalExtractor>>,
    scorer: FusionScorer,
}

impl SignalEngine {
    pub fn new(extractors: Vec<Box<dyn SignalExtractor>>, weights: FusionWeights) -> Self {
        Self {
            extractors,
            scorer: FusionScorer::new(weights),
        }
    }

    /// The standard extractor catalogue over `TaCalculator` series names.
    pub fn standard(weights: FusionWeights) -> Self {
        Self::new(standard_extractors(), weights)
    }

    pub fn extractor_names(&self) -> Vec<&str> {
        self.extractors.iter().map(|e| e.name()).collect()
    }

    pub fn scorer(&self) -> &FusionScorer {
        &self.scorer
    }

    /// Every extractor's events for bar `index`.
    pub fn extract_at(&self, input: &ExtractionInput<'_>, index: usize) -> Vec<SignalEvent> {
        self.extractors
            .iter()
            .flat_map(|extractor| extractor.extract(input, index))
            .collect()
    }

    /// Composite signals for every bar at or after `from` (all bars when `None`).
    ///
    /// Fails only when the frame does not line up with `bars`.
    pub fn evaluate(
        &self,
        symbol: &str,
        bars: &[PriceBar],
        frame: &IndicatorFrame,
        from: Option<DateTime<Utc>>,
    ) -> Result<Vec<CompositeSignal>, AlignmentError> {
        frame.validate_alignment(bars)?;
        let input = ExtractionInput::new(bars, frame);
        let start = from.map_or(0, |from| bars.partition_point(|b| b.timestamp < from));

        Ok((start..bars.len())
            .map(|index| {
                self.scorer
                    .fuse(symbol, bars[index].timestamp, self.extract_at(&input, index))
            })
            .collect())
    }
}

pub fn standard_extractors() -> Vec<Box<dyn SignalExtractor>> {
    let atr = || GapNormalizer::Volatility(SeriesRef::scalar("atr"));
    vec![
        Box::new(CrossingExtractor::new(
            "ma_cross",
            SeriesRef::scalar("ma5"),
            CrossReference::Series(SeriesRef::scalar("ma20")),
            atr(),
        )),
        Box::new(CrossingExtractor::new(
            "ema_cross",
            SeriesRef::scalar("ema12"),
            CrossReference::Series(SeriesRef::scalar("ema26")),
            atr(),
        )),
        Box::new(CrossingExtractor::new(
            "macd_cross",
            SeriesRef::new("macd", "dif"),
            CrossReference::Series(SeriesRef::new("macd", "signal")),
            atr(),
        )),
        Box::new(CrossingExtractor::new(
            "kd_cross",
            SeriesRef::new("kdj", "k"),
            CrossReference::Series(SeriesRef::new("kdj", "d")),
            GapNormalizer::Fixed(20.0),
        )),
        Box::new(CrossingExtractor::new(
            "cci_zero_cross",
            SeriesRef::scalar("cci"),
            CrossReference::Level(0.0),
            GapNormalizer::Fixed(100.0),
        )),
        Box::new(CrossingExtractor::new(
            "mom_zero_cross",
            SeriesRef::scalar("mom"),
            CrossReference::Level(0.0),
            atr(),
        )),
        Box::new(DivergenceExtractor::new(
            "macd_divergence",
            SeriesRef::new("macd", "dif"),
        )),
        Box::new(DivergenceExtractor::new(
            "rsi_divergence",
            SeriesRef::scalar("rsi14"),
        )),
        Box::new(AnomalyExtractor::new("price_anomaly", AnomalyMetric::Return)),
        Box::new(AnomalyExtractor::new("volume_anomaly", AnomalyMetric::Volume)),
        Box::new(SupportResistanceExtractor::new("support_resistance")),
        Box::new(ZoneExtractor::oscillator("rsi_zone", SeriesRef::scalar("rsi14"), 70.0, 30.0)),
        Box::new(ZoneExtractor::oscillator("rsi_near_zone", SeriesRef::scalar("rsi14"), 70.0, 30.0).approaching(5.0)),
        Box::new(
            ZoneExtractor::oscillator("kd_zone", SeriesRef::new("kdj", "k"), 80.0, 20.0)
                .with_line(SeriesRef::new("kdj", "d")),
        ),
        Box::new(ZoneExtractor::oscillator("cci_zone", SeriesRef::scalar("cci"), 100.0, -100.0)),
        Box::new(ZoneExtractor::oscillator("willr_zone", SeriesRef::scalar("willr"), -20.0, -80.0)),
        Box::new(ZoneExtractor::band(
            "bollinger_break",
            SeriesRef::new("bollinger", "upper"),
            SeriesRef::new("bollinger", "lower"),
        )),
        Box::new(TrendExtractor::new("trend_bias", SeriesRef::scalar("ma20"), atr())),
    ]
}
