//! Daily close series per symbol.

use chrono::NaiveDate;
use serde::Serialize;

use super::error::RotatorError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// Ordered (date, close) pairs for one symbol.
///
/// Construction enforces strictly increasing dates and finite, positive
/// closes, so every consumer can index by position without re-checking.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    symbol: String,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, points: Vec<PricePoint>) -> Result<Self, RotatorError> {
        let symbol = symbol.into();
        for pair in points.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(RotatorError::UnorderedSeries {
                    symbol,
                    date: pair[1].date.to_string(),
                });
            }
        }
        if let Some(bad) = points.iter().find(|p| !p.close.is_finite() || p.close <= 0.0) {
            return Err(RotatorError::Data {
                reason: format!("{} has non-positive close {} on {}", symbol, bad.close, bad.date),
            });
        }
        Ok(Self { symbol, points })
    }

    /// Builds a series from unordered pairs, sorting by date first.
    pub fn from_unsorted(
        symbol: impl Into<String>,
        mut points: Vec<PricePoint>,
    ) -> Result<Self, RotatorError> {
        points.sort_by_key(|p| p.date);
        Self::new(symbol, points)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    /// Index of the last bar dated on or before `date`.
    pub fn index_at_or_before(&self, date: NaiveDate) -> Option<usize> {
        match self.points.partition_point(|p| p.date <= date) {
            0 => None,
            n => Some(n - 1),
        }
    }

    /// Close of the last bar dated on or before `date`.
    pub fn close_at_or_before(&self, date: NaiveDate) -> Option<f64> {
        self.index_at_or_before(date).map(|i| self.points[i].close)
    }

    pub fn latest_close(&self) -> Option<f64> {
        self.points.last().map(|p| p.close)
    }

    /// Sub-series restricted to `[start, end]`.
    pub fn slice(&self, start: NaiveDate, end: NaiveDate) -> PriceSeries {
        PriceSeries {
            symbol: self.symbol.clone(),
            points: self
                .points
                .iter()
                .filter(|p| p.date >= start && p.date <= end)
                .copied()
                .collect(),
        }
    }
}
