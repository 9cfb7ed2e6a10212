//! Configuration validation.
//!
//! Checks every section a command depends on before any data is loaded, so
//! a bad value fails fast with the section and key that caused it.

use crate::domain::backtest::{MissingHistoryPolicy, StrategyMode};
use crate::domain::error::RotatorError;
use crate::domain::timeline::RebalanceCadence;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::str::FromStr;

pub const ASSET_SECTION_PREFIX: &str = "asset:";

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> RotatorError {
    RotatorError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn missing(section: &str, key: &str) -> RotatorError {
    RotatorError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

/// Optional float; present-but-unparseable is an error rather than a default.
pub fn optional_double(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<f64>, RotatorError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| invalid(section, key, format!("'{}' is not a number", s.trim()))),
    }
}

pub fn optional_usize(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<usize>, RotatorError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(s) => s
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| invalid(section, key, format!("'{}' is not a whole number", s.trim()))),
    }
}

/// Optional enum value parsed through its `FromStr`.
pub fn optional_parsed<T: FromStr<Err = RotatorError>>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<T>, RotatorError> {
    config
        .get_string(section, key)
        .map(|s| s.parse::<T>().map_err(|e| invalid(section, key, e.to_string())))
        .transpose()
}

pub fn parse_date(value: Option<&str>, section: &str, field: &str) -> Result<NaiveDate, RotatorError> {
    match value {
        None => Err(missing(section, field)),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map_err(|_| invalid(section, field, format!("invalid {} format, expected YYYY-MM-DD", field))),
    }
}

pub fn asset_symbols(config: &dyn ConfigPort) -> Vec<String> {
    config.get_list("portfolio", "assets")
}

pub fn validate_portfolio_config(config: &dyn ConfigPort) -> Result<(), RotatorError> {
    validate_assets(config)?;
    validate_asset_sections(config)?;
    validate_signals(config)?;
    validate_allocation(config)?;
    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), RotatorError> {
    validate_portfolio_config(config)?;
    validate_dates(config)?;
    validate_initial_capital(config)?;
    validate_risk_free_rate(config)?;
    optional_parsed::<RebalanceCadence>(config, "backtest", "cadence")?;
    optional_parsed::<MissingHistoryPolicy>(config, "backtest", "missing_history")?;
    optional_parsed::<StrategyMode>(config, "backtest", "mode")?;
    Ok(())
}

pub fn validate_rebalance_config(config: &dyn ConfigPort) -> Result<(), RotatorError> {
    validate_portfolio_config(config)?;
    if let Some(cash) = optional_double(config, "rebalance", "cash")? {
        if cash < 0.0 {
            return Err(invalid("rebalance", "cash", "cash must be non-negative"));
        }
    }
    Ok(())
}

fn validate_assets(config: &dyn ConfigPort) -> Result<(), RotatorError> {
    let symbols = asset_symbols(config);
    if symbols.is_empty() {
        return Err(missing("portfolio", "assets"));
    }
    let mut seen = BTreeSet::new();
    for symbol in &symbols {
        if !seen.insert(symbol.as_str()) {
            return Err(invalid("portfolio", "assets", format!("{} is listed twice", symbol)));
        }
    }

    let benchmark = match config.get_string("portfolio", "benchmark") {
        Some(b) if !b.trim().is_empty() => b.trim().to_string(),
        _ => return Err(missing("portfolio", "benchmark")),
    };

    if let Some(weight) = optional_double(config, "portfolio", "benchmark_weight")? {
        if !(0.0..=1.0).contains(&weight) {
            return Err(invalid(
                "portfolio",
                "benchmark_weight",
                "benchmark_weight must be between 0 and 1",
            ));
        }
        if !seen.contains(benchmark.as_str()) {
            return Err(invalid(
                "portfolio",
                "benchmark_weight",
                format!("benchmark {} is not one of the assets", benchmark),
            ));
        }
    }
    Ok(())
}

fn validate_asset_sections(config: &dyn ConfigPort) -> Result<(), RotatorError> {
    let symbols = asset_symbols(config);
    for section in config.sections() {
        let Some(symbol) = section.strip_prefix(ASSET_SECTION_PREFIX) else {
            continue;
        };
        if !symbols.iter().any(|s| s == symbol) {
            return Err(invalid(&section, "", format!("{} is not listed in [portfolio] assets", symbol)));
        }
        if let Some(base) = optional_double(config, &section, "base_weight")? {
            if !(0.0..=1.0).contains(&base) {
                return Err(invalid(&section, "base_weight", "base_weight must be between 0 and 1"));
            }
        }
        for key in ["trend_adjustment", "relative_adjustment"] {
            if let Some(value) = optional_double(config, &section, key)? {
                if value < 0.0 {
                    return Err(invalid(&section, key, format!("{} must be non-negative", key)));
                }
            }
        }
    }
    Ok(())
}

fn validate_signals(config: &dyn ConfigPort) -> Result<(), RotatorError> {
    for key in ["trend_window", "performance_window"] {
        if optional_usize(config, "signals", key)? == Some(0) {
            return Err(invalid("signals", key, format!("{} must be at least 1", key)));
        }
    }
    Ok(())
}

fn validate_allocation(config: &dyn ConfigPort) -> Result<(), RotatorError> {
    if let Some(step) = optional_double(config, "allocation", "rounding_step")? {
        let units = (1.0 / step).round();
        if step <= 0.0 || step > 1.0 || (units * step - 1.0).abs() > 1e-9 {
            return Err(invalid(
                "allocation",
                "rounding_step",
                "rounding_step must divide 1.0 evenly",
            ));
        }
    }
    let floor = optional_double(config, "allocation", "weight_floor")?.unwrap_or(0.0);
    if floor < 0.0 {
        return Err(invalid("allocation", "weight_floor", "weight_floor must be non-negative"));
    }
    if let Some(cap) = optional_double(config, "allocation", "weight_cap")? {
        if cap < floor {
            return Err(invalid("allocation", "weight_cap", "weight_cap must not be below weight_floor"));
        }
    }
    Ok(())
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), RotatorError> {
    if let Some(value) = optional_double(config, "backtest", "initial_capital")? {
        if value <= 0.0 {
            return Err(invalid("backtest", "initial_capital", "initial_capital must be positive"));
        }
    }
    Ok(())
}

fn validate_risk_free_rate(config: &dyn ConfigPort) -> Result<(), RotatorError> {
    let value = optional_double(config, "backtest", "risk_free_rate")?.unwrap_or(0.0);
    if !(0.0..1.0).contains(&value) {
        return Err(invalid("backtest", "risk_free_rate", "risk_free_rate must be between 0 and 1"));
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), RotatorError> {
    let start_str = config.get_string("backtest", "start_date");
    let end_str = config.get_string("backtest", "end_date");

    let start_date = parse_date(start_str.as_deref(), "backtest", "start_date")?;
    let end_date = parse_date(end_str.as_deref(), "backtest", "end_date")?;

    if start_date >= end_date {
        return Err(invalid("backtest", "start_date", "start_date must be before end_date"));
    }
    Ok(())
}
