//! Performance metrics over a value curve.

use chrono::NaiveDate;
use serde::Serialize;

use super::timeline::month_ends;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const DAYS_PER_YEAR: f64 = 365.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub start_value: f64,
    pub end_value: f64,
    pub total_return: f64,
    /// Compound annual growth on a 365-calendar-day year.
    pub cagr: f64,
    pub max_drawdown: f64,
    /// Longest run of points spent below a prior peak.
    pub max_drawdown_duration: i64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub longest_winning_streak: usize,
    pub longest_losing_streak: usize,
}

impl Metrics {
    pub fn compute(curve: &[EquityPoint], risk_free_rate: f64) -> Self {
        let start_value = curve.first().map(|p| p.value).unwrap_or(0.0);
        let end_value = curve.last().map(|p| p.value).unwrap_or(start_value);

        let total_return = if start_value > 0.0 {
            (end_value - start_value) / start_value
        } else {
            0.0
        };

        let days = match (curve.first(), curve.last()) {
            (Some(first), Some(last)) => (last.date - first.date).num_days(),
            _ => 0,
        };
        let years = days as f64 / DAYS_PER_YEAR;
        let cagr = if years > 0.0 && start_value > 0.0 && end_value > 0.0 {
            (end_value / start_value).powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(curve);

        let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
        let (sharpe_ratio, sortino_ratio) = compute_risk_adjusted(curve, daily_rf);

        let (longest_winning_streak, longest_losing_streak) = month_end_streaks(curve);

        Metrics {
            start_value,
            end_value,
            total_return,
            cagr,
            max_drawdown,
            max_drawdown_duration,
            sharpe_ratio,
            sortino_ratio,
            longest_winning_streak,
            longest_losing_streak,
        }
    }
}

fn compute_drawdown(curve: &[EquityPoint]) -> (f64, i64) {
    let Some(first) = curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first.value;
    let mut max_dd = 0.0_f64;
    let mut max_dd_duration = 0i64;
    let mut current_dd_duration = 0i64;

    for point in curve {
        if point.value >= peak {
            peak = point.value;
            current_dd_duration = 0;
        } else if peak > 0.0 {
            let dd = (peak - point.value) / peak;
            max_dd = max_dd.max(dd);
            current_dd_duration += 1;
            max_dd_duration = max_dd_duration.max(current_dd_duration);
        }
    }

    (max_dd, max_dd_duration)
}

fn compute_risk_adjusted(curve: &[EquityPoint], daily_rf: f64) -> (f64, f64) {
    let returns: Vec<f64> = curve
        .windows(2)
        .map(|w| {
            if w[0].value > 0.0 {
                (w[1].value - w[0].value) / w[0].value
            } else {
                0.0
            }
        })
        .collect();

    if returns.is_empty() {
        return (0.0, 0.0);
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let stddev = (returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n).sqrt();
    let excess = mean - daily_rf;

    let sharpe = if stddev > 0.0 {
        excess / stddev * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    let downside = (returns
        .iter()
        .filter(|&&r| r < daily_rf)
        .map(|&r| (r - daily_rf).powi(2))
        .sum::<f64>()
        / n)
        .sqrt();

    let sortino = if downside > 0.0 {
        excess / downside * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    (sharpe, sortino)
}

/// Longest runs of positive and negative month-over-month returns, measured
/// between the last point of each calendar month. A flat month breaks both.
fn month_end_streaks(curve: &[EquityPoint]) -> (usize, usize) {
    let Some(first) = curve.first() else {
        return (0, 0);
    };

    let dates: Vec<NaiveDate> = curve.iter().map(|p| p.date).collect();
    let month_end_values = month_ends(&dates)
        .into_iter()
        .filter_map(|d| curve.binary_search_by_key(&d, |p| p.date).ok().map(|i| curve[i].value));

    let mut previous = first.value;
    let (mut winning, mut losing) = (0usize, 0usize);
    let (mut best_winning, mut best_losing) = (0usize, 0usize);
    for value in month_end_values {
        if value > previous {
            winning += 1;
            losing = 0;
        } else if value < previous {
            losing += 1;
            winning = 0;
        } else {
            winning = 0;
            losing = 0;
        }
        best_winning = best_winning.max(winning);
        best_losing = best_losing.max(losing);
        previous = value;
    }

    (best_winning, best_losing)
}
