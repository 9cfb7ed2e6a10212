//! Historical simulation of the rotation strategy.
//!
//! Walks the unified timeline, marking a notional portfolio to market every
//! date and rebalancing it on the cadence dates. The benchmark curve is a
//! buy-and-hold of the benchmark series from the same initial capital.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use super::allocation::{allocate, neutral_allocation, AllocationConfig, WeightResult};
use super::asset::AssetConfig;
use super::error::RotatorError;
use super::metrics::{EquityPoint, Metrics};
use super::price_series::PriceSeries;
use super::rebalance::{rebalance, Holding, OrderAction, RebalanceInput, UnitPolicy};
use super::signal::{evaluate_all, trailing_return, AssetSignals, SignalConfig};
use super::timeline::{build_unified_timeline, rebalance_dates, RebalanceCadence};

/// What to do on a rebalance date when some series is too short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingHistoryPolicy {
    /// Keep the prior target weights and trade back to them.
    #[default]
    CarryForward,
    /// Zero the short assets and reallocate across the rest.
    ExcludeAsset,
}

impl fmt::Display for MissingHistoryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingHistoryPolicy::CarryForward => write!(f, "carry_forward"),
            MissingHistoryPolicy::ExcludeAsset => write!(f, "exclude_asset"),
        }
    }
}

impl FromStr for MissingHistoryPolicy {
    type Err = RotatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "carry_forward" | "carry" => Ok(MissingHistoryPolicy::CarryForward),
            "exclude_asset" | "exclude" => Ok(MissingHistoryPolicy::ExcludeAsset),
            other => Err(RotatorError::invalid(
                "missing_history",
                format!("unknown policy '{}'", other),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyMode {
    /// Signals tilt the base weights on each rebalance.
    #[default]
    Rotation,
    /// Rebalance back to the base weights, ignoring signals.
    FixedWeights,
}

impl fmt::Display for StrategyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyMode::Rotation => write!(f, "rotation"),
            StrategyMode::FixedWeights => write!(f, "fixed_weights"),
        }
    }
}

impl FromStr for StrategyMode {
    type Err = RotatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "rotation" => Ok(StrategyMode::Rotation),
            "fixed_weights" | "fixed" => Ok(StrategyMode::FixedWeights),
            other => Err(RotatorError::invalid(
                "mode",
                format!("unknown strategy mode '{}'", other),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub cadence: RebalanceCadence,
    pub signals: SignalConfig,
    pub allocation: AllocationConfig,
    pub missing_history: MissingHistoryPolicy,
    pub mode: StrategyMode,
    /// Annual rate used for the Sharpe and Sortino figures.
    pub risk_free_rate: f64,
}

impl BacktestConfig {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate, initial_capital: f64) -> Self {
        BacktestConfig {
            start_date,
            end_date,
            initial_capital,
            cadence: RebalanceCadence::default(),
            signals: SignalConfig::default(),
            allocation: AllocationConfig::default(),
            missing_history: MissingHistoryPolicy::default(),
            mode: StrategyMode::default(),
            risk_free_rate: 0.0,
        }
    }

    pub fn validate(&self) -> Result<(), RotatorError> {
        if self.end_date < self.start_date {
            return Err(RotatorError::invalid("end_date", "must not precede start_date"));
        }
        if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
            return Err(RotatorError::invalid("initial_capital", "must be positive"));
        }
        if !self.risk_free_rate.is_finite() {
            return Err(RotatorError::invalid("risk_free_rate", "must be a number"));
        }
        self.signals.validate()?;
        self.allocation.validate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BacktestPoint {
    pub date: NaiveDate,
    pub portfolio_value: f64,
    pub benchmark_value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RebalanceRecord {
    pub date: NaiveDate,
    pub weights: Vec<WeightResult>,
    /// Portfolio value marked before trading.
    pub portfolio_value: f64,
    pub carried_forward: bool,
    /// Return since the previous rebalance; `None` on the first one.
    pub gain_since_previous: Option<f64>,
    pub orders: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub points: Vec<BacktestPoint>,
    pub rebalances: Vec<RebalanceRecord>,
    pub final_holdings: Vec<Holding>,
    pub final_cash: f64,
}

impl BacktestResult {
    pub fn portfolio_curve(&self) -> Vec<EquityPoint> {
        self.points
            .iter()
            .map(|p| EquityPoint {
                date: p.date,
                value: p.portfolio_value,
            })
            .collect()
    }

    pub fn benchmark_curve(&self) -> Vec<EquityPoint> {
        self.points
            .iter()
            .map(|p| EquityPoint {
                date: p.date,
                value: p.benchmark_value,
            })
            .collect()
    }

    pub fn portfolio_metrics(&self, risk_free_rate: f64) -> Metrics {
        Metrics::compute(&self.portfolio_curve(), risk_free_rate)
    }

    pub fn benchmark_metrics(&self, risk_free_rate: f64) -> Metrics {
        Metrics::compute(&self.benchmark_curve(), risk_free_rate)
    }

    pub fn final_value(&self) -> Option<f64> {
        self.points.last().map(|p| p.portfolio_value)
    }

    pub fn total_return(&self) -> f64 {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) if first.portfolio_value > 0.0 => {
                last.portfolio_value / first.portfolio_value - 1.0
            }
            _ => 0.0,
        }
    }
}

fn is_history_gap(err: &RotatorError) -> bool {
    matches!(
        err,
        RotatorError::InsufficientHistory { .. } | RotatorError::NoData { .. }
    )
}

/// Target weights for one rebalance date; `None` means carry forward.
fn rotation_targets(
    assets: &[(&AssetConfig, &PriceSeries)],
    benchmark: &PriceSeries,
    date: NaiveDate,
    config: &BacktestConfig,
) -> Result<Option<Vec<WeightResult>>, RotatorError> {
    if let Err(err) = trailing_return(benchmark, date, config.signals.performance_window) {
        if is_history_gap(&err) {
            tracing::debug!(%date, "benchmark lacks history, carrying allocation forward");
            return Ok(None);
        }
        return Err(err);
    }

    let evaluated = evaluate_all(assets, benchmark, date, &config.signals);

    let mut ready: Vec<(&AssetConfig, AssetSignals)> = Vec::with_capacity(assets.len());
    let mut excluded: Vec<&AssetConfig> = Vec::new();
    for (&(asset, _), result) in assets.iter().zip(evaluated) {
        match result {
            Ok(signals) => ready.push((asset, signals)),
            Err(err) if is_history_gap(&err) => excluded.push(asset),
            Err(err) => return Err(err),
        }
    }

    if excluded.is_empty() {
        let inputs: Vec<(&AssetConfig, &AssetSignals)> = ready.iter().map(|(a, s)| (*a, s)).collect();
        return allocate(&inputs, &config.allocation).map(Some);
    }

    match config.missing_history {
        MissingHistoryPolicy::CarryForward => {
            tracing::debug!(%date, short = excluded.len(), "assets lack history, carrying allocation forward");
            Ok(None)
        }
        MissingHistoryPolicy::ExcludeAsset if ready.is_empty() => Ok(None),
        MissingHistoryPolicy::ExcludeAsset => {
            let mut allocation = config.allocation.clone();
            if let Some(pinned) = &allocation.pinned {
                if excluded.iter().any(|a| &a.symbol == pinned) {
                    allocation.pinned = None;
                }
            }
            let inputs: Vec<(&AssetConfig, &AssetSignals)> = ready.iter().map(|(a, s)| (*a, s)).collect();
            let mut weights = allocate(&inputs, &allocation)?;
            weights.extend(excluded.iter().map(|a| WeightResult {
                symbol: a.symbol.clone(),
                raw_weight: 0.0,
                normalized_weight: 0.0,
                rounded_weight: 0.0,
            }));
            weights.sort_by(|a, b| a.symbol.cmp(&b.symbol));
            Ok(Some(weights))
        }
    }
}

/// Runs the strategy over `[start_date, end_date]`.
///
/// Every asset needs a series in `series`; the benchmark may also appear
/// among the assets. Identical inputs give identical results.
pub fn run_backtest(
    assets: &[AssetConfig],
    series: &[PriceSeries],
    benchmark: &PriceSeries,
    config: &BacktestConfig,
) -> Result<BacktestResult, RotatorError> {
    config.validate()?;
    for asset in assets {
        asset.validate()?;
    }

    let by_symbol: HashMap<&str, &PriceSeries> = series.iter().map(|s| (s.symbol(), s)).collect();
    let paired: Vec<(&AssetConfig, &PriceSeries)> = assets
        .iter()
        .map(|a| {
            by_symbol
                .get(a.symbol.as_str())
                .map(|s| (a, *s))
                .ok_or_else(|| RotatorError::NoData {
                    symbol: a.symbol.clone(),
                })
        })
        .collect::<Result<_, _>>()?;

    let mut all_series: Vec<&PriceSeries> = paired.iter().map(|(_, s)| *s).collect();
    all_series.push(benchmark);
    let timeline = build_unified_timeline(&all_series, config.start_date, config.end_date);
    let Some(&first_date) = timeline.first() else {
        return Err(RotatorError::Data {
            reason: format!(
                "no bars between {} and {}",
                config.start_date, config.end_date
            ),
        });
    };
    let schedule = rebalance_dates(&timeline, config.cadence);

    let neutral = neutral_allocation(assets, first_date, &config.allocation)?;
    let mut current = neutral.clone();

    let mut units: BTreeMap<String, f64> = BTreeMap::new();
    let mut cash = config.initial_capital;
    let mut benchmark_units: Option<f64> = None;

    let mut points = Vec::with_capacity(timeline.len());
    let mut rebalances: Vec<RebalanceRecord> = Vec::new();

    tracing::debug!(
        start = %first_date,
        dates = timeline.len(),
        rebalances = schedule.len(),
        mode = %config.mode,
        "running backtest"
    );

    for &date in &timeline {
        let prices: BTreeMap<String, f64> = paired
            .iter()
            .filter_map(|(a, s)| s.close_at_or_before(date).map(|c| (a.symbol.clone(), c)))
            .collect();

        let marked = cash
            + units
                .iter()
                .filter_map(|(symbol, held)| prices.get(symbol).map(|p| held * p))
                .sum::<f64>();

        let mut portfolio_value = marked;

        if schedule.contains(&date) {
            let targets = match config.mode {
                StrategyMode::FixedWeights => Some(neutral.clone()),
                StrategyMode::Rotation => rotation_targets(&paired, benchmark, date, config)?,
            };
            let carried_forward = targets.is_none();
            if let Some(targets) = targets {
                current = targets;
            }

            let holdings: Vec<Holding> = units
                .iter()
                .map(|(symbol, held)| Holding::new(symbol.clone(), *held))
                .collect();
            let plan = rebalance(&RebalanceInput {
                targets: &current,
                holdings: &holdings,
                prices: &prices,
                cash,
                policy: UnitPolicy::Fractional,
            })?;

            for order in &plan.orders {
                let held = units.entry(order.symbol.clone()).or_insert(0.0);
                match order.action {
                    OrderAction::Sell => {
                        *held = (*held - order.units).max(0.0);
                        cash += order.estimated_amount;
                    }
                    OrderAction::Buy => {
                        *held += order.units;
                        cash -= order.estimated_amount;
                    }
                }
            }
            units.retain(|_, held| *held > 0.0);
            cash = cash.max(0.0);

            portfolio_value = cash
                + units
                    .iter()
                    .filter_map(|(symbol, held)| prices.get(symbol).map(|p| held * p))
                    .sum::<f64>();

            let gain_since_previous = rebalances
                .last()
                .filter(|r| r.portfolio_value > 0.0)
                .map(|r| marked / r.portfolio_value - 1.0);

            rebalances.push(RebalanceRecord {
                date,
                weights: current.clone(),
                portfolio_value: marked,
                carried_forward,
                gain_since_previous,
                orders: plan.orders.len(),
            });
        }

        let benchmark_close = benchmark.close_at_or_before(date);
        if benchmark_units.is_none() {
            benchmark_units = benchmark_close.map(|close| config.initial_capital / close);
        }
        let benchmark_value = match (benchmark_units, benchmark_close) {
            (Some(held), Some(close)) => held * close,
            _ => config.initial_capital,
        };

        points.push(BacktestPoint {
            date,
            portfolio_value,
            benchmark_value,
        });
    }

    let final_holdings = units
        .into_iter()
        .map(|(symbol, held)| Holding::new(symbol, held))
        .collect();

    Ok(BacktestResult {
        points,
        rebalances,
        final_holdings,
        final_cash: cash,
    })
}
