//! Trend and relative-performance signals.
//!
//! SMA(n)   = mean of the last n closes ending at the as-of bar (inclusive)
//! RET(n)   = C[i] / C[i-n] - 1
//! Trend    : close vs SMA(trend_window)
//! Relative : RET(performance_window) of the asset vs the benchmark
//!
//! The as-of bar is the last bar dated on or before the as-of date. Every
//! evaluation recomputes from the supplied series; nothing is cached.

use chrono::NaiveDate;
use rayon::prelude::*;
use std::fmt;

use super::asset::AssetConfig;
use super::error::RotatorError;
use super::price_series::PriceSeries;

pub const DEFAULT_TREND_WINDOW: usize = 50;
pub const DEFAULT_PERFORMANCE_WINDOW: usize = 63;

const TREND_TOLERANCE: f64 = 1e-9;
const RETURN_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalConfig {
    pub trend_window: usize,
    pub performance_window: usize,
}

impl Default for SignalConfig {
    fn default() -> Self {
        SignalConfig {
            trend_window: DEFAULT_TREND_WINDOW,
            performance_window: DEFAULT_PERFORMANCE_WINDOW,
        }
    }
}

impl SignalConfig {
    pub fn validate(&self) -> Result<(), RotatorError> {
        if self.trend_window == 0 {
            return Err(RotatorError::invalid("trend_window", "must be at least 1"));
        }
        if self.performance_window == 0 {
            return Err(RotatorError::invalid("performance_window", "must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrendDirection {
    Uptrend,
    Downtrend,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelativeDirection {
    Outperform,
    Underperform,
    Neutral,
}

impl TrendDirection {
    pub fn sign(self) -> f64 {
        match self {
            TrendDirection::Uptrend => 1.0,
            TrendDirection::Downtrend => -1.0,
            TrendDirection::Neutral => 0.0,
        }
    }
}

impl RelativeDirection {
    pub fn sign(self) -> f64 {
        match self {
            RelativeDirection::Outperform => 1.0,
            RelativeDirection::Underperform => -1.0,
            RelativeDirection::Neutral => 0.0,
        }
    }
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendDirection::Uptrend => write!(f, "Uptrend"),
            TrendDirection::Downtrend => write!(f, "Downtrend"),
            TrendDirection::Neutral => write!(f, "Neutral"),
        }
    }
}

impl fmt::Display for RelativeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelativeDirection::Outperform => write!(f, "Outperform"),
            RelativeDirection::Underperform => write!(f, "Underperform"),
            RelativeDirection::Neutral => write!(f, "Neutral"),
        }
    }
}

/// A direction plus the adjustment it carries into allocation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Signal<D> {
    pub direction: D,
    pub magnitude: f64,
}

pub type TrendSignal = Signal<TrendDirection>;
pub type RelativeSignal = Signal<RelativeDirection>;

impl TrendSignal {
    pub fn adjustment(&self) -> f64 {
        self.direction.sign() * self.magnitude
    }
}

impl RelativeSignal {
    pub fn adjustment(&self) -> f64 {
        self.direction.sign() * self.magnitude
    }
}

/// Both signals for one asset on one as-of date, with the inputs that
/// produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetSignals {
    pub symbol: String,
    pub as_of: NaiveDate,
    pub close: f64,
    pub sma: f64,
    pub asset_return: f64,
    pub benchmark_return: f64,
    pub trend: TrendSignal,
    pub relative: RelativeSignal,
}

impl AssetSignals {
    /// Signals that leave the base weight untouched.
    pub fn neutral(asset: &AssetConfig, as_of: NaiveDate) -> Self {
        AssetSignals {
            symbol: asset.symbol.clone(),
            as_of,
            close: 0.0,
            sma: 0.0,
            asset_return: 0.0,
            benchmark_return: 0.0,
            trend: Signal {
                direction: TrendDirection::Neutral,
                magnitude: asset.trend_adjustment,
            },
            relative: Signal {
                direction: RelativeDirection::Neutral,
                magnitude: asset.relative_adjustment,
            },
        }
    }

    pub fn total_adjustment(&self) -> f64 {
        self.trend.adjustment() + self.relative.adjustment()
    }
}

fn as_of_index(series: &PriceSeries, as_of: NaiveDate, required: usize) -> Result<usize, RotatorError> {
    let bars = series.index_at_or_before(as_of).map_or(0, |i| i + 1);
    if bars < required {
        return Err(RotatorError::InsufficientHistory {
            symbol: series.symbol().to_string(),
            bars,
            required,
        });
    }
    Ok(bars - 1)
}

/// Simple moving average of the `window` closes ending at the as-of bar.
pub fn sma(series: &PriceSeries, as_of: NaiveDate, window: usize) -> Result<f64, RotatorError> {
    if window == 0 {
        return Err(RotatorError::invalid("trend_window", "must be at least 1"));
    }
    let end = as_of_index(series, as_of, window)?;
    let closes = &series.points()[end + 1 - window..=end];
    Ok(closes.iter().map(|p| p.close).sum::<f64>() / window as f64)
}

/// Percentage return over the trailing `window` bars ending at the as-of bar.
pub fn trailing_return(
    series: &PriceSeries,
    as_of: NaiveDate,
    window: usize,
) -> Result<f64, RotatorError> {
    if window == 0 {
        return Err(RotatorError::invalid("performance_window", "must be at least 1"));
    }
    let end = as_of_index(series, as_of, window + 1)?;
    let points = series.points();
    Ok(points[end].close / points[end - window].close - 1.0)
}

pub fn classify_trend(close: f64, average: f64) -> TrendDirection {
    let tolerance = TREND_TOLERANCE * average.abs().max(1.0);
    if (close - average).abs() <= tolerance {
        TrendDirection::Neutral
    } else if close > average {
        TrendDirection::Uptrend
    } else {
        TrendDirection::Downtrend
    }
}

pub fn classify_relative(asset_return: f64, benchmark_return: f64) -> RelativeDirection {
    if (asset_return - benchmark_return).abs() <= RETURN_TOLERANCE {
        RelativeDirection::Neutral
    } else if asset_return > benchmark_return {
        RelativeDirection::Outperform
    } else {
        RelativeDirection::Underperform
    }
}

/// Evaluates trend and relative-performance signals for one asset.
pub fn evaluate(
    asset: &AssetConfig,
    series: &PriceSeries,
    benchmark: &PriceSeries,
    as_of: NaiveDate,
    config: &SignalConfig,
) -> Result<AssetSignals, RotatorError> {
    config.validate()?;

    let average = sma(series, as_of, config.trend_window)?;
    let asset_return = trailing_return(series, as_of, config.performance_window)?;
    let benchmark_return = trailing_return(benchmark, as_of, config.performance_window)?;

    let close = series
        .close_at_or_before(as_of)
        .ok_or_else(|| RotatorError::NoData {
            symbol: asset.symbol.clone(),
        })?;

    Ok(AssetSignals {
        symbol: asset.symbol.clone(),
        as_of,
        close,
        sma: average,
        asset_return,
        benchmark_return,
        trend: Signal {
            direction: classify_trend(close, average),
            magnitude: asset.trend_adjustment,
        },
        relative: Signal {
            direction: classify_relative(asset_return, benchmark_return),
            magnitude: asset.relative_adjustment,
        },
    })
}

/// Evaluates every asset against one benchmark in parallel.
///
/// Results come back in input order; each entry fails or succeeds on its own.
pub fn evaluate_all(
    assets: &[(&AssetConfig, &PriceSeries)],
    benchmark: &PriceSeries,
    as_of: NaiveDate,
    config: &SignalConfig,
) -> Vec<Result<AssetSignals, RotatorError>> {
    assets
        .par_iter()
        .map(|(asset, series)| evaluate(asset, series, benchmark, as_of, config))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::price_series::PricePoint;
    use approx::assert_relative_eq;

    fn date(i: usize) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(i as i64)
    }

    fn make_series(symbol: &str, closes: &[f64]) -> PriceSeries {
        PriceSeries::new(
            symbol,
            closes
                .iter()
                .enumerate()
                .map(|(i, &close)| PricePoint { date: date(i), close })
                .collect(),
        )
        .unwrap()
    }

    fn ramp(start: f64, step: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| start + step * i as f64).collect()
    }

    fn small_config() -> SignalConfig {
        SignalConfig {
            trend_window: 3,
            performance_window: 2,
        }
    }

    #[test]
    fn sma_basic() {
        let s = make_series("A", &[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_relative_eq!(sma(&s, date(4), 3).unwrap(), 4.0);
        assert_relative_eq!(sma(&s, date(2), 3).unwrap(), 2.0);
    }

    #[test]
    fn sma_exact_minimum_history_succeeds() {
        let s = make_series("A", &[1.0, 2.0, 3.0]);
        assert!(sma(&s, date(2), 3).is_ok());
    }

    #[test]
    fn sma_insufficient_history() {
        let s = make_series("A", &[1.0, 2.0, 3.0]);
        let err = sma(&s, date(2), 4).unwrap_err();
        assert_eq!(
            err,
            RotatorError::InsufficientHistory {
                symbol: "A".into(),
                bars: 3,
                required: 4
            }
        );
    }

    #[test]
    fn sma_ignores_bars_after_as_of() {
        let s = make_series("A", &[1.0, 2.0, 3.0, 100.0]);
        assert_relative_eq!(sma(&s, date(2), 3).unwrap(), 2.0);
    }

    #[test]
    fn sma_as_of_before_first_bar() {
        let s = make_series("A", &[1.0, 2.0]);
        let as_of = date(0) - chrono::Duration::days(1);
        let err = sma(&s, as_of, 1).unwrap_err();
        assert!(matches!(err, RotatorError::InsufficientHistory { bars: 0, .. }));
    }

    #[test]
    fn trailing_return_basic() {
        let s = make_series("A", &[100.0, 105.0, 110.0]);
        assert_relative_eq!(trailing_return(&s, date(2), 2).unwrap(), 0.10, epsilon = 1e-12);
    }

    #[test]
    fn trailing_return_needs_window_plus_one_bars() {
        let s = make_series("A", &[100.0, 105.0, 110.0]);
        assert!(trailing_return(&s, date(2), 2).is_ok());
        assert!(matches!(
            trailing_return(&s, date(2), 3),
            Err(RotatorError::InsufficientHistory { required: 4, .. })
        ));
    }

    #[test]
    fn zero_window_rejected() {
        let s = make_series("A", &[100.0]);
        assert!(matches!(sma(&s, date(0), 0), Err(RotatorError::InvalidParameter { .. })));
        assert!(matches!(
            trailing_return(&s, date(0), 0),
            Err(RotatorError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn classify_trend_directions() {
        assert_eq!(classify_trend(11.0, 10.0), TrendDirection::Uptrend);
        assert_eq!(classify_trend(9.0, 10.0), TrendDirection::Downtrend);
        assert_eq!(classify_trend(10.0, 10.0), TrendDirection::Neutral);
    }

    #[test]
    fn classify_relative_directions() {
        assert_eq!(classify_relative(0.2, 0.1), RelativeDirection::Outperform);
        assert_eq!(classify_relative(0.0, 0.1), RelativeDirection::Underperform);
        assert_eq!(classify_relative(0.1, 0.1), RelativeDirection::Neutral);
    }

    #[test]
    fn evaluate_uptrend_outperform() {
        let asset = AssetConfig::new("QQQ", 0.2);
        let series = make_series("QQQ", &ramp(100.0, 2.0, 10));
        let bench = make_series("VOO", &ramp(100.0, 1.0, 10));
        let signals = evaluate(&asset, &series, &bench, date(9), &small_config()).unwrap();

        assert_eq!(signals.trend.direction, TrendDirection::Uptrend);
        assert_eq!(signals.relative.direction, RelativeDirection::Outperform);
        assert_relative_eq!(signals.trend.adjustment(), 0.10);
        assert_relative_eq!(signals.relative.adjustment(), 0.05);
        assert_relative_eq!(signals.total_adjustment(), 0.15, epsilon = 1e-12);
    }

    #[test]
    fn evaluate_downtrend_underperform() {
        let asset = AssetConfig::new("QQQ", 0.2);
        let series = make_series("QQQ", &ramp(200.0, -2.0, 10));
        let bench = make_series("VOO", &ramp(100.0, 1.0, 10));
        let signals = evaluate(&asset, &series, &bench, date(9), &small_config()).unwrap();

        assert_eq!(signals.trend.direction, TrendDirection::Downtrend);
        assert_eq!(signals.relative.direction, RelativeDirection::Underperform);
        assert_relative_eq!(signals.total_adjustment(), -0.15, epsilon = 1e-12);
    }

    #[test]
    fn benchmark_against_itself_is_relative_neutral() {
        let asset = AssetConfig::new("VOO", 0.4);
        let bench = make_series("VOO", &ramp(100.0, 1.0, 10));
        let signals = evaluate(&asset, &bench, &bench, date(9), &small_config()).unwrap();
        assert_eq!(signals.relative.direction, RelativeDirection::Neutral);
    }

    #[test]
    fn flat_series_is_neutral() {
        let asset = AssetConfig::new("QQQ", 0.2);
        let series = make_series("QQQ", &[50.0; 10]);
        let bench = make_series("VOO", &[80.0; 10]);
        let signals = evaluate(&asset, &series, &bench, date(9), &small_config()).unwrap();
        assert_eq!(signals.trend.direction, TrendDirection::Neutral);
        assert_eq!(signals.relative.direction, RelativeDirection::Neutral);
        assert_relative_eq!(signals.total_adjustment(), 0.0);
    }

    #[test]
    fn benchmark_history_checked_independently() {
        let asset = AssetConfig::new("QQQ", 0.2);
        let series = make_series("QQQ", &ramp(100.0, 1.0, 10));
        let bench = make_series("VOO", &ramp(100.0, 1.0, 2));
        let err = evaluate(&asset, &series, &bench, date(9), &small_config()).unwrap_err();
        assert!(matches!(err, RotatorError::InsufficientHistory { ref symbol, .. } if symbol == "VOO"));
    }

    #[test]
    fn default_windows_exact_minimum() {
        let config = SignalConfig::default();
        let asset = AssetConfig::new("QQQ", 0.2);
        // 63-bar return needs 64 closes, more than the 50-bar average
        let n = config.performance_window + 1;

        let series = make_series("QQQ", &ramp(100.0, 1.0, n));
        let bench = make_series("VOO", &ramp(100.0, 0.5, n));
        assert!(evaluate(&asset, &series, &bench, date(n - 1), &config).is_ok());

        let short = make_series("QQQ", &ramp(100.0, 1.0, n - 1));
        let bench_short = make_series("VOO", &ramp(100.0, 0.5, n - 1));
        assert!(matches!(
            evaluate(&asset, &short, &bench_short, date(n - 2), &config),
            Err(RotatorError::InsufficientHistory { .. })
        ));
    }

    #[test]
    fn evaluate_is_deterministic() {
        let asset = AssetConfig::new("QQQ", 0.2);
        let series = make_series("QQQ", &ramp(100.0, 1.5, 10));
        let bench = make_series("VOO", &ramp(100.0, 1.0, 10));
        let a = evaluate(&asset, &series, &bench, date(9), &small_config()).unwrap();
        let b = evaluate(&asset, &series, &bench, date(9), &small_config()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn evaluate_all_preserves_order_and_isolates_failures() {
        let qqq = AssetConfig::new("QQQ", 0.3);
        let spmo = AssetConfig::new("SPMO", 0.3);
        let qqq_series = make_series("QQQ", &ramp(100.0, 2.0, 10));
        let spmo_series = make_series("SPMO", &ramp(100.0, 2.0, 2));
        let bench = make_series("VOO", &ramp(100.0, 1.0, 10));

        let results = evaluate_all(
            &[(&qqq, &qqq_series), (&spmo, &spmo_series)],
            &bench,
            date(9),
            &small_config(),
        );
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().symbol, "QQQ");
        assert!(matches!(
            results[1],
            Err(RotatorError::InsufficientHistory { ref symbol, .. }) if symbol == "SPMO"
        ));
    }
}
