//! Default indicator calculator backed by the `ta` crate.

use crate::common::math;
use crate::error::IndicatorError;
use crate::indicators::IndicatorCalculator;
use crate::models::{IndicatorFrame, IndicatorSeries, PriceBar};
use chrono::{DateTime, Utc};
use ta::indicators::{
    AverageTrueRange, BollingerBands, ExponentialMovingAverage, MovingAverageConvergenceDivergence,
    RelativeStrengthIndex, SimpleMovingAverage,
};
use ta::Next;
use tracing::warn;

/// Periods for every series the calculator emits.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorParams {
    pub ma_periods: Vec<usize>,
    pub ema_periods: Vec<usize>,
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub kdj_period: usize,
    pub bollinger_period: usize,
    pub bollinger_multiplier: f64,
    pub atr_period: usize,
    pub cci_period: usize,
    pub willr_period: usize,
    pub mom_period: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            ma_periods: vec![5, 10, 20, 60],
            ema_periods: vec![12, 26],
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            kdj_period: 9,
            bollinger_period: 20,
            bollinger_multiplier: 2.0,
            atr_period: 14,
            cci_period: 14,
            willr_period: 14,
            mom_period: 10,
        }
    }
}

impl IndicatorParams {
    pub fn validate(&self) -> Result<(), IndicatorError> {
        let periods = self
            .ma_periods
            .iter()
            .map(|p| ("ma_period", *p))
            .chain(self.ema_periods.iter().map(|p| ("ema_period", *p)))
            .chain([
                ("rsi_period", self.rsi_period),
                ("macd_fast", self.macd_fast),
                ("macd_slow", self.macd_slow),
                ("macd_signal", self.macd_signal),
                ("kdj_period", self.kdj_period),
                ("bollinger_period", self.bollinger_period),
                ("atr_period", self.atr_period),
                ("cci_period", self.cci_period),
                ("willr_period", self.willr_period),
                ("mom_period", self.mom_period),
            ]);
        for (param, value) in periods {
            if value == 0 {
                return Err(IndicatorError::InvalidParam {
                    param,
                    value,
                    reason: "period must be positive",
                });
            }
        }
        if self.macd_fast >= self.macd_slow {
            return Err(IndicatorError::InvalidParam {
                param: "macd_fast",
                value: self.macd_fast,
                reason: "fast period must be shorter than slow period",
            });
        }
        Ok(())
    }

    /// Bars before the slowest series produces its first value.
    pub fn longest_warmup(&self) -> usize {
        let ma = self.ma_periods.iter().chain(&self.ema_periods).copied().max().unwrap_or(0);
        [
            ma,
            self.rsi_period + 1,
            self.macd_slow + self.macd_signal - 1,
            self.bollinger_period,
            self.atr_period,
            self.cci_period,
            self.mom_period + 1,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }
}

/// Computes the standard indicator set over a sorted bar sequence.
///
/// Warm-up positions are NaN. Every series carries the bars' timestamps.
#[derive(Debug, Clone, Default)]
pub struct TaCalculator {
    params: IndicatorParams,
}

impl TaCalculator {
    pub fn new(params: IndicatorParams) -> Result<Self, IndicatorError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &IndicatorParams {
        &self.params
    }
}

impl IndicatorCalculator for TaCalculator {
    fn compute(&self, bars: &[PriceBar]) -> IndicatorFrame {
        let p = &self.params;
        let timestamps: Vec<DateTime<Utc>> = bars.iter().map(|b| b.timestamp).collect();
        let close: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let high: Vec<f64> = bars.iter().map(|b| b.high).collect();
        let low: Vec<f64> = bars.iter().map(|b| b.low).collect();
        let n = bars.len();

        let mut frame = IndicatorFrame::new();

        for &period in &p.ma_periods {
            let mut values = run_scalar(SimpleMovingAverage::new(period), &close, "sma");
            math::mask_warmup(&mut values, period - 1);
            frame.insert(IndicatorSeries::scalar(format!("ma{}", period), timestamps.clone(), values));
        }

        for &period in &p.ema_periods {
            let mut values = run_scalar(ExponentialMovingAverage::new(period), &close, "ema");
            math::mask_warmup(&mut values, period - 1);
            frame.insert(IndicatorSeries::scalar(format!("ema{}", period), timestamps.clone(), values));
        }

        let mut rsi = run_scalar(RelativeStrengthIndex::new(p.rsi_period), &close, "rsi");
        math::mask_warmup(&mut rsi, p.rsi_period);
        frame.insert(IndicatorSeries::scalar(format!("rsi{}", p.rsi_period), timestamps.clone(), rsi));

        let (mut dif, mut signal, mut hist) = (vec![f64::NAN; n], vec![f64::NAN; n], vec![f64::NAN; n]);
        match MovingAverageConvergenceDivergence::new(p.macd_fast, p.macd_slow, p.macd_signal) {
            Ok(mut macd) => {
                for (i, c) in close.iter().enumerate() {
                    let out = macd.next(*c);
                    dif[i] = out.macd;
                    signal[i] = out.signal;
                    hist[i] = out.histogram;
                }
            }
            Err(e) => warn!(error = ?e, "macd parameters rejected, emitting NaN"),
        }
        let macd_warmup = p.macd_slow + p.macd_signal - 2;
        for column in [&mut dif, &mut signal, &mut hist] {
            math::mask_warmup(column, macd_warmup);
        }
        frame.insert(IndicatorSeries::multi(
            "macd",
            timestamps.clone(),
            vec![("dif", dif), ("signal", signal), ("hist", hist)],
        ));

        let (k, d, j) = math::kdj(&high, &low, &close, p.kdj_period);
        frame.insert(IndicatorSeries::multi(
            "kdj",
            timestamps.clone(),
            vec![("k", k), ("d", d), ("j", j)],
        ));

        let (mut upper, mut middle, mut lower) = (vec![f64::NAN; n], vec![f64::NAN; n], vec![f64::NAN; n]);
        match BollingerBands::new(p.bollinger_period, p.bollinger_multiplier) {
            Ok(mut bb) => {
                for (i, c) in close.iter().enumerate() {
                    let out = bb.next(*c);
                    upper[i] = out.upper;
                    middle[i] = out.average;
                    lower[i] = out.lower;
                }
            }
            Err(e) => warn!(error = ?e, "bollinger parameters rejected, emitting NaN"),
        }
        for column in [&mut upper, &mut middle, &mut lower] {
            math::mask_warmup(column, p.bollinger_period - 1);
        }
        frame.insert(IndicatorSeries::multi(
            "bollinger",
            timestamps.clone(),
            vec![("upper", upper), ("middle", middle), ("lower", lower)],
        ));

        let mut atr = vec![f64::NAN; n];
        match AverageTrueRange::new(p.atr_period) {
            Ok(mut indicator) => {
                for (i, bar) in bars.iter().enumerate() {
                    atr[i] = indicator.next(bar);
                }
            }
            Err(e) => warn!(error = ?e, "atr parameters rejected, emitting NaN"),
        }
        math::mask_warmup(&mut atr, p.atr_period - 1);
        frame.insert(IndicatorSeries::scalar("atr", timestamps.clone(), atr));

        frame.insert(IndicatorSeries::scalar(
            "cci",
            timestamps.clone(),
            math::cci(&high, &low, &close, p.cci_period),
        ));
        frame.insert(IndicatorSeries::scalar(
            "willr",
            timestamps.clone(),
            math::williams_r(&high, &low, &close, p.willr_period),
        ));
        frame.insert(IndicatorSeries::scalar(
            "mom",
            timestamps,
            math::momentum(&close, p.mom_period),
        ));

        frame
    }
}

fn run_scalar<I, E>(indicator: Result<I, E>, values: &[f64], label: &'static str) -> Vec<f64>
where
    I: Next<f64, Output = f64>,
    E: std::fmt::Debug,
{
    match indicator {
        Ok(mut indicator) => values.iter().map(|v| indicator.next(*v)).collect(),
        Err(e) => {
            warn!(indicator = label, error = ?e, "indicator parameters rejected, emitting NaN");
            vec![f64::NAN; values.len()]
        }
    }
}
