//! Small numeric helpers shared by the calculator and the extractors.
//!
//! All routines treat non-finite inputs as missing and return NaN (or `None`)
//! instead of panicking.

/// Mean and sample standard deviation of `values[end - window..end]`.
///
/// `None` when the window does not fit or contains a non-finite value.
pub fn trailing_mean_std(values: &[f64], end: usize, window: usize) -> Option<(f64, f64)> {
    if window < 2 || end > values.len() || end < window {
        return None;
    }
    let slice = &values[end - window..end];
    if slice.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let n = window as f64;
    let mean = slice.iter().sum::<f64>() / n;
    let var = slice.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some((mean, var.sqrt()))
}

/// Simple returns `c[i] / c[i-1] - 1`; index 0 and any gap are NaN.
pub fn simple_returns(closes: &[f64]) -> Vec<f64> {
    let mut out = vec![f64::NAN; closes.len()];
    for i in 1..closes.len() {
        let (prev, cur) = (closes[i - 1], closes[i]);
        if prev.is_finite() && cur.is_finite() && prev != 0.0 {
            out[i] = cur / prev - 1.0;
        }
    }
    out
}

/// Indices that are swing highs with a complete `±k` neighborhood.
///
/// A swing high is strictly greater than the `k` values before it and at least
/// as large as the `k` values after it, so a flat top yields its first bar only.
pub fn swing_highs(values: &[f64], k: usize) -> Vec<usize> {
    (0..values.len()).filter(|&i| is_swing_high(values, i, k)).collect()
}

/// Mirror of [`swing_highs`].
pub fn swing_lows(values: &[f64], k: usize) -> Vec<usize> {
    (0..values.len()).filter(|&i| is_swing_low(values, i, k)).collect()
}

pub fn is_swing_high(values: &[f64], i: usize, k: usize) -> bool {
    is_pivot(values, i, k, |center, other| center > other, |center, other| center >= other)
}

pub fn is_swing_low(values: &[f64], i: usize, k: usize) -> bool {
    is_pivot(values, i, k, |center, other| center < other, |center, other| center <= other)
}

fn is_pivot(
    values: &[f64],
    i: usize,
    k: usize,
    before: impl Fn(f64, f64) -> bool,
    after: impl Fn(f64, f64) -> bool,
) -> bool {
    if k == 0 || i < k || i + k >= values.len() {
        return false;
    }
    let center = values[i];
    center.is_finite()
        && (1..=k).all(|j| values[i - j].is_finite() && before(center, values[i - j]))
        && (1..=k).all(|j| values[i + j].is_finite() && after(center, values[i + j]))
}

/// `pick`-reduction of `values[i + 1 - period..=i]`, NaN if the window is short or gapped.
fn window_extreme(values: &[f64], i: usize, period: usize, pick: fn(f64, f64) -> f64) -> f64 {
    if period == 0 || i + 1 < period {
        return f64::NAN;
    }
    let slice = &values[i + 1 - period..=i];
    if slice.iter().any(|v| !v.is_finite()) {
        return f64::NAN;
    }
    slice.iter().copied().fold(slice[0], pick)
}

/// Stochastic KDJ: RSV over `period`, K and D smoothed 2/3 previous + 1/3 new from 50.
pub fn kdj(high: &[f64], low: &[f64], close: &[f64], period: usize) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let n = close.len();
    let mut k_out = vec![f64::NAN; n];
    let mut d_out = vec![f64::NAN; n];
    let mut j_out = vec![f64::NAN; n];
    let (mut k, mut d) = (50.0, 50.0);
    for i in 0..n {
        let hh = window_extreme(high, i, period, f64::max);
        let ll = window_extreme(low, i, period, f64::min);
        if !hh.is_finite() || !ll.is_finite() || !close[i].is_finite() {
            continue;
        }
        let rsv = if hh > ll {
            (close[i] - ll) / (hh - ll) * 100.0
        } else {
            50.0
        };
        k = 2.0 / 3.0 * k + rsv / 3.0;
        d = 2.0 / 3.0 * d + k / 3.0;
        k_out[i] = k;
        d_out[i] = d;
        j_out[i] = 3.0 * k - 2.0 * d;
    }
    (k_out, d_out, j_out)
}

/// Commodity channel index on the typical price with the usual 0.015 constant.
pub fn cci(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<f64> {
    let n = close.len();
    let typical: Vec<f64> = (0..n).map(|i| (high[i] + low[i] + close[i]) / 3.0).collect();
    let mut out = vec![f64::NAN; n];
    if period == 0 {
        return out;
    }
    for i in (period - 1)..n {
        let slice = &typical[i + 1 - period..=i];
        if slice.iter().any(|v| !v.is_finite()) {
            continue;
        }
        let mean = slice.iter().sum::<f64>() / period as f64;
        let mean_dev = slice.iter().map(|v| (v - mean).abs()).sum::<f64>() / period as f64;
        out[i] = if mean_dev > 0.0 {
            (typical[i] - mean) / (0.015 * mean_dev)
        } else {
            0.0
        };
    }
    out
}

/// Williams %R in `[-100, 0]`.
pub fn williams_r(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<f64> {
    (0..close.len())
        .map(|i| {
            let hh = window_extreme(high, i, period, f64::max);
            let ll = window_extreme(low, i, period, f64::min);
            if !hh.is_finite() || !ll.is_finite() || !close[i].is_finite() {
                f64::NAN
            } else if hh > ll {
                (hh - close[i]) / (hh - ll) * -100.0
            } else {
                -50.0
            }
        })
        .collect()
}

/// `values[i] - values[i - period]`.
pub fn momentum(values: &[f64], period: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| {
            if period == 0 || i < period {
                f64::NAN
            } else {
                values[i] - values[i - period]
            }
        })
        .collect()
}

/// Overwrite the first `count` positions with NaN.
pub fn mask_warmup(values: &mut [f64], count: usize) {
    let end = count.min(values.len());
    values[..end].iter_mut().for_each(|v| *v = f64::NAN);
}

/// `|a - b| <= tolerance * max(1, |b|)`.
pub fn within_tolerance(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance * b.abs().max(1.0)
}
