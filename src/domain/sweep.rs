//! Parameter sweep over adjustment magnitudes, pinned weights and modes.

use rayon::prelude::*;

use super::asset::AssetConfig;
use super::backtest::{run_backtest, BacktestConfig, StrategyMode};
use super::error::RotatorError;
use super::price_series::PriceSeries;

#[derive(Debug, Clone, PartialEq)]
pub struct SweepGrid {
    pub trend_adjustments: Vec<f64>,
    pub relative_adjustments: Vec<f64>,
    /// Base weights to try for the pinned symbol; `None` keeps the configured one.
    pub pinned_weights: Vec<Option<f64>>,
    pub modes: Vec<StrategyMode>,
}

impl SweepGrid {
    pub fn cases(&self) -> Vec<SweepCase> {
        let mut cases = Vec::new();
        for &mode in &self.modes {
            for &pinned_weight in &self.pinned_weights {
                for &trend_adjustment in &self.trend_adjustments {
                    for &relative_adjustment in &self.relative_adjustments {
                        cases.push(SweepCase {
                            index: cases.len(),
                            trend_adjustment,
                            relative_adjustment,
                            pinned_weight,
                            mode,
                        });
                    }
                }
            }
        }
        cases
    }

    pub fn validate(&self) -> Result<(), RotatorError> {
        if self.trend_adjustments.is_empty()
            || self.relative_adjustments.is_empty()
            || self.pinned_weights.is_empty()
            || self.modes.is_empty()
        {
            return Err(RotatorError::invalid("sweep", "every grid axis needs a value"));
        }
        for &value in self.trend_adjustments.iter().chain(&self.relative_adjustments) {
            if !value.is_finite() || value < 0.0 {
                return Err(RotatorError::invalid("sweep", format!("adjustment {} is negative", value)));
            }
        }
        for weight in self.pinned_weights.iter().flatten() {
            if !(0.0..=1.0).contains(weight) {
                return Err(RotatorError::invalid(
                    "sweep",
                    format!("pinned weight {} must be between 0 and 1", weight),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepCase {
    pub index: usize,
    pub trend_adjustment: f64,
    pub relative_adjustment: f64,
    pub pinned_weight: Option<f64>,
    pub mode: StrategyMode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SweepOutcome {
    pub case: SweepCase,
    pub final_value: f64,
    pub total_return: f64,
    pub cagr: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
}

/// Asset set for one case: adjustments replaced, and the pinned symbol's base
/// weight overridden with the others rescaled to fill the remainder.
fn case_assets(
    assets: &[AssetConfig],
    case: &SweepCase,
    pinned: Option<&str>,
) -> Result<Vec<AssetConfig>, RotatorError> {
    let mut out: Vec<AssetConfig> = assets
        .iter()
        .map(|a| a.clone().with_adjustments(case.trend_adjustment, case.relative_adjustment))
        .collect();

    let Some(weight) = case.pinned_weight else {
        return Ok(out);
    };
    let Some(pinned) = pinned else {
        return Err(RotatorError::invalid(
            "sweep",
            "pinned weights need a pinned symbol in [allocation]",
        ));
    };

    let others: f64 = out.iter().filter(|a| a.symbol != pinned).map(|a| a.base_weight).sum();
    for asset in &mut out {
        if asset.symbol == pinned {
            asset.base_weight = weight;
        } else if others > 0.0 {
            asset.base_weight = asset.base_weight / others * (1.0 - weight);
        }
    }
    Ok(out)
}

/// Runs one backtest per grid case in parallel, best total return first.
/// Ties keep grid order.
pub fn run_sweep(
    assets: &[AssetConfig],
    series: &[PriceSeries],
    benchmark: &PriceSeries,
    base: &BacktestConfig,
    grid: &SweepGrid,
) -> Result<Vec<SweepOutcome>, RotatorError> {
    grid.validate()?;
    let cases = grid.cases();
    tracing::info!(cases = cases.len(), "running parameter sweep");

    let mut outcomes = cases
        .par_iter()
        .map(|case| {
            let case_assets = case_assets(assets, case, base.allocation.pinned.as_deref())?;
            let config = BacktestConfig {
                mode: case.mode,
                ..base.clone()
            };
            let result = run_backtest(&case_assets, series, benchmark, &config)?;
            let metrics = result.portfolio_metrics(config.risk_free_rate);
            Ok(SweepOutcome {
                case: *case,
                final_value: metrics.end_value,
                total_return: metrics.total_return,
                cagr: metrics.cagr,
                max_drawdown: metrics.max_drawdown,
                sharpe_ratio: metrics.sharpe_ratio,
            })
        })
        .collect::<Result<Vec<_>, RotatorError>>()?;

    outcomes.sort_by(|a, b| {
        b.total_return
            .total_cmp(&a.total_return)
            .then(a.case.index.cmp(&b.case.index))
    });
    Ok(outcomes)
}
