//! Indicator calculation capability.
//!
//! The pipeline only depends on [`IndicatorCalculator`]; any implementation that
//! returns series aligned with its input bars can be swapped in.

pub mod calculator;

pub use calculator::{IndicatorParams, TaCalculator};

use crate::models::{IndicatorFrame, PriceBar};

pub trait IndicatorCalculator: Send + Sync {
    /// Series for `bars` (sorted, one symbol). Never fails: positions without
    /// enough history hold NaN.
    fn compute(&self, bars: &[PriceBar]) -> IndicatorFrame;
}
