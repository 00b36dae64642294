use crate::error::AlignmentError;
use crate::models::bar::PriceBar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field name used by single-valued series.
pub const VALUE: &str = "value";

/// One indicator over a bar sequence: one column per output field, aligned 1:1 with the bars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSeries {
    pub name: String,
    pub fields: Vec<String>,
    pub timestamps: Vec<DateTime<Utc>>,
    pub columns: Vec<Vec<f64>>,
}

impl IndicatorSeries {
    pub fn scalar(name: impl Into<String>, timestamps: Vec<DateTime<Utc>>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            fields: vec![VALUE.to_string()],
            timestamps,
            columns: vec![values],
        }
    }

    pub fn multi(
        name: impl Into<String>,
        timestamps: Vec<DateTime<Utc>>,
        columns: Vec<(&str, Vec<f64>)>,
    ) -> Self {
        let (fields, columns) = columns
            .into_iter()
            .map(|(field, values)| (field.to_string(), values))
            .unzip();
        Self {
            name: name.into(),
            fields,
            timestamps,
            columns,
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn field(&self, field: &str) -> Option<&[f64]> {
        self.fields
            .iter()
            .position(|f| f == field)
            .map(|idx| self.columns[idx].as_slice())
    }

    /// Value of `field` at `index`, `None` when absent or not finite.
    pub fn at(&self, field: &str, index: usize) -> Option<f64> {
        self.field(field)
            .and_then(|col| col.get(index).copied())
            .filter(|v| v.is_finite())
    }
}

/// Addresses one column of one indicator series, e.g. `macd.dif`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeriesRef {
    pub indicator: String,
    pub field: String,
}

impl SeriesRef {
    pub fn new(indicator: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            indicator: indicator.into(),
            field: field.into(),
        }
    }

    pub fn scalar(indicator: impl Into<String>) -> Self {
        Self::new(indicator, VALUE)
    }
}

impl std::fmt::Display for SeriesRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.field == VALUE {
            write!(f, "{}", self.indicator)
        } else {
            write!(f, "{}.{}", self.indicator, self.field)
        }
    }
}

/// All indicator series computed from one bar sequence, keyed by indicator name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorFrame {
    pub series: BTreeMap<String, IndicatorSeries>,
}

impl IndicatorFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, series: IndicatorSeries) {
        self.series.insert(series.name.clone(), series);
    }

    pub fn get(&self, name: &str) -> Option<&IndicatorSeries> {
        self.series.get(name)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Finite value addressed by `series_ref` at bar `index`.
    pub fn value(&self, series_ref: &SeriesRef, index: usize) -> Option<f64> {
        self.get(&series_ref.indicator)
            .and_then(|s| s.at(&series_ref.field, index))
    }

    /// Every series must match `bars` exactly in count and timestamp.
    pub fn validate_alignment(&self, bars: &[PriceBar]) -> Result<(), AlignmentError> {
        for series in self.series.values() {
            if series.timestamps.len() != bars.len() {
                return Err(AlignmentError::LengthMismatch {
                    indicator: series.name.clone(),
                    expected: bars.len(),
                    actual: series.timestamps.len(),
                });
            }
            if series.fields.len() != series.columns.len() {
                return Err(AlignmentError::FieldMismatch {
                    indicator: series.name.clone(),
                    fields: series.fields.len(),
                    columns: series.columns.len(),
                });
            }
            for (field, column) in series.fields.iter().zip(&series.columns) {
                if column.len() != bars.len() {
                    return Err(AlignmentError::LengthMismatch {
                        indicator: format!("{}.{}", series.name, field),
                        expected: bars.len(),
                        actual: column.len(),
                    });
                }
            }
            if let Some(index) = series
                .timestamps
                .iter()
                .zip(bars)
                .position(|(ts, bar)| *ts != bar.timestamp)
            {
                return Err(AlignmentError::TimestampMismatch {
                    indicator: series.name.clone(),
                    index,
                    expected: bars[index].timestamp,
                    actual: series.timestamps[index],
                });
            }
        }
        Ok(())
    }

    /// Flattened `name.field -> value` rows per timestamp, NaN as `None`.
    pub fn rows(&self) -> Vec<(DateTime<Utc>, BTreeMap<String, Option<f64>>)> {
        let Some(first) = self.series.values().next() else {
            return Vec::new();
        };
        first
            .timestamps
            .iter()
            .enumerate()
            .map(|(index, ts)| {
                let mut values = BTreeMap::new();
                for series in self.series.values() {
                    for (field, column) in series.fields.iter().zip(&series.columns) {
                        let key = if field == VALUE {
                            series.name.clone()
                        } else {
                            format!("{}.{}", series.name, field)
                        };
                        let value = column.get(index).copied().filter(|v| v.is_finite());
                        values.insert(key, value);
                    }
                }
                (*ts, values)
            })
            .collect()
    }
}
