//! Signal extraction and fusion.

pub mod anomaly;
pub mod crossing;
pub mod divergence;
pub mod engine;
pub mod extractor;
pub mod fusion;
pub mod support_resistance;
pub mod zone;

pub use anomaly::{AnomalyExtractor, AnomalyMetric};
pub use crossing::{CrossReference, CrossingExtractor, GapNormalizer};
pub use divergence::DivergenceExtractor;
pub use engine::{standard_extractors, SignalEngine};
pub use extractor::{ExtractionInput, SignalExtractor};
pub use fusion::{classify, FusionScorer, FusionWeights};
pub use support_resistance::{cluster_levels, PriceLevel, SupportResistanceExtractor};
pub use zone::{TrendExtractor, ZoneExtractor, ZoneSubject};
