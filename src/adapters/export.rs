//! CSV export of backtest curves, orders, weights and sweep rankings.

use crate::domain::allocation::WeightResult;
use crate::domain::backtest::BacktestPoint;
use crate::domain::error::RotatorError;
use crate::domain::rebalance::Order;
use crate::domain::sweep::SweepOutcome;
use serde::Serialize;
use std::io::Write;

fn csv_error(e: csv::Error) -> RotatorError {
    RotatorError::Io(format!("CSV write error: {}", e))
}

fn write_rows<W: Write, T: Serialize>(writer: W, rows: impl IntoIterator<Item = T>) -> Result<(), RotatorError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row).map_err(csv_error)?;
    }
    wtr.flush()?;
    Ok(())
}

/// `date,portfolio_value,benchmark_value`, one row per timeline date.
pub fn write_backtest_csv<W: Write>(writer: W, points: &[BacktestPoint]) -> Result<(), RotatorError> {
    write_rows(writer, points)
}

pub fn write_orders_csv<W: Write>(writer: W, orders: &[Order]) -> Result<(), RotatorError> {
    write_rows(writer, orders)
}

pub fn write_weights_csv<W: Write>(writer: W, weights: &[WeightResult]) -> Result<(), RotatorError> {
    write_rows(writer, weights)
}

#[derive(Serialize)]
struct SweepRow {
    rank: usize,
    mode: String,
    trend_adjustment: f64,
    relative_adjustment: f64,
    pinned_weight: Option<f64>,
    final_value: f64,
    total_return: f64,
    cagr: f64,
    max_drawdown: f64,
    sharpe_ratio: f64,
}

pub fn write_sweep_csv<W: Write>(writer: W, outcomes: &[SweepOutcome]) -> Result<(), RotatorError> {
    write_rows(
        writer,
        outcomes.iter().enumerate().map(|(i, o)| SweepRow {
            rank: i + 1,
            mode: o.case.mode.to_string(),
            trend_adjustment: o.case.trend_adjustment,
            relative_adjustment: o.case.relative_adjustment,
            pinned_weight: o.case.pinned_weight,
            final_value: o.final_value,
            total_return: o.total_return,
            cagr: o.cagr,
            max_drawdown: o.max_drawdown,
            sharpe_ratio: o.sharpe_ratio,
        }),
    )
}
