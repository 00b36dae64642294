//! Tolerant row comparison between a stored bar and a freshly fetched one.

use crate::common::math::within_tolerance;
use crate::models::PriceBar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStatus {
    /// Stored and within tolerance on every field.
    Unchanged,
    /// Stored but at least one field differs.
    Changed,
    /// Nothing stored at this timestamp.
    New,
}

/// Classify `fetched` against what is stored at the same timestamp.
///
/// Prices match when `|stored - fetched| <= tolerance * max(1, |fetched|)`;
/// volume must match exactly. A non-finite stored price always counts as changed
/// so a damaged row gets rewritten by the feed.
pub fn compare(stored: Option<&PriceBar>, fetched: &PriceBar, tolerance: f64) -> RowStatus {
    match stored {
        None => RowStatus::New,
        Some(stored) if differing_fields(stored, fetched, tolerance).is_empty() => {
            RowStatus::Unchanged
        }
        Some(_) => RowStatus::Changed,
    }
}

/// Names of the fields that fall outside tolerance, in OHLCV order.
pub fn differing_fields(stored: &PriceBar, fetched: &PriceBar, tolerance: f64) -> Vec<&'static str> {
    let prices = [
        ("open", stored.open, fetched.open),
        ("high", stored.high, fetched.high),
        ("low", stored.low, fetched.low),
        ("close", stored.close, fetched.close),
    ];
    let mut fields: Vec<&'static str> = prices
        .iter()
        .filter(|(_, s, f)| !s.is_finite() || !within_tolerance(*s, *f, tolerance))
        .map(|(name, _, _)| *name)
        .collect();
    if stored.volume != fetched.volume {
        fields.push("volume");
    }
    fields
}
