//! Unified backtest timeline and rebalance calendar.

use chrono::{Datelike, NaiveDate};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::error::RotatorError;
use super::price_series::PriceSeries;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RebalanceCadence {
    Daily,
    Weekly,
    #[default]
    Monthly,
    Quarterly,
    Yearly,
}

impl RebalanceCadence {
    /// Key shared by every date in the same cadence period.
    fn period_key(self, date: NaiveDate) -> (i32, u32, u32) {
        match self {
            RebalanceCadence::Daily => (date.year(), date.ordinal(), 0),
            RebalanceCadence::Weekly => {
                let week = date.iso_week();
                (week.year(), week.week(), 0)
            }
            RebalanceCadence::Monthly => (date.year(), date.month(), 0),
            RebalanceCadence::Quarterly => (date.year(), date.month0() / 3, 0),
            RebalanceCadence::Yearly => (date.year(), 0, 0),
        }
    }
}

impl fmt::Display for RebalanceCadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RebalanceCadence::Daily => "daily",
            RebalanceCadence::Weekly => "weekly",
            RebalanceCadence::Monthly => "monthly",
            RebalanceCadence::Quarterly => "quarterly",
            RebalanceCadence::Yearly => "yearly",
        };
        f.write_str(name)
    }
}

impl FromStr for RebalanceCadence {
    type Err = RotatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(RebalanceCadence::Daily),
            "weekly" => Ok(RebalanceCadence::Weekly),
            "monthly" => Ok(RebalanceCadence::Monthly),
            "quarterly" => Ok(RebalanceCadence::Quarterly),
            "yearly" | "annual" | "annually" => Ok(RebalanceCadence::Yearly),
            other => Err(RotatorError::invalid(
                "cadence",
                format!("unknown cadence '{}'", other),
            )),
        }
    }
}

/// Sorted union of every bar date within `[start, end]`.
pub fn build_unified_timeline(
    series: &[&PriceSeries],
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<NaiveDate> {
    let unique_dates: BTreeSet<NaiveDate> = series
        .iter()
        .flat_map(|s| s.points().iter().map(|p| p.date))
        .filter(|d| *d >= start && *d <= end)
        .collect();
    unique_dates.into_iter().collect()
}

/// The first timeline date plus the last date of every cadence period.
pub fn rebalance_dates(timeline: &[NaiveDate], cadence: RebalanceCadence) -> BTreeSet<NaiveDate> {
    let mut dates = BTreeSet::new();
    let Some(&first) = timeline.first() else {
        return dates;
    };
    dates.insert(first);
    for pair in timeline.windows(2) {
        if cadence.period_key(pair[0]) != cadence.period_key(pair[1]) {
            dates.insert(pair[0]);
        }
    }
    if let Some(&last) = timeline.last() {
        dates.insert(last);
    }
    dates
}

/// Dates where the month changes on the next timeline entry, plus the final date.
pub fn month_ends(timeline: &[NaiveDate]) -> Vec<NaiveDate> {
    let mut ends: Vec<NaiveDate> = timeline
        .windows(2)
        .filter(|pair| (pair[0].year(), pair[0].month()) != (pair[1].year(), pair[1].month()))
        .map(|pair| pair[0])
        .collect();
    if let Some(&last) = timeline.last() {
        ends.push(last);
    }
    ends
}
