//! Per-asset allocation settings.

use super::error::RotatorError;

pub const DEFAULT_TREND_ADJUSTMENT: f64 = 0.10;
pub const DEFAULT_RELATIVE_ADJUSTMENT: f64 = 0.05;

#[derive(Debug, Clone, PartialEq)]
pub struct AssetConfig {
    pub symbol: String,
    pub base_weight: f64,
    pub trend_adjustment: f64,
    pub relative_adjustment: f64,
}

impl AssetConfig {
    /// Asset with the default adjustment magnitudes.
    pub fn new(symbol: impl Into<String>, base_weight: f64) -> Self {
        AssetConfig {
            symbol: symbol.into(),
            base_weight,
            trend_adjustment: DEFAULT_TREND_ADJUSTMENT,
            relative_adjustment: DEFAULT_RELATIVE_ADJUSTMENT,
        }
    }

    pub fn with_adjustments(mut self, trend: f64, relative: f64) -> Self {
        self.trend_adjustment = trend;
        self.relative_adjustment = relative;
        self
    }

    pub fn validate(&self) -> Result<(), RotatorError> {
        if self.symbol.trim().is_empty() {
            return Err(RotatorError::invalid("symbol", "must not be empty"));
        }
        if !self.base_weight.is_finite() || !(0.0..=1.0).contains(&self.base_weight) {
            return Err(RotatorError::invalid(
                "base_weight",
                format!("{} must be between 0 and 1", self.symbol),
            ));
        }
        for (name, value) in [
            ("trend_adjustment", self.trend_adjustment),
            ("relative_adjustment", self.relative_adjustment),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(RotatorError::invalid(
                    name,
                    format!("{} must be a non-negative number", self.symbol),
                ));
            }
        }
        Ok(())
    }
}

/// Equal base weights, optionally pinning `benchmark` to `benchmark_weight`
/// and splitting the remainder evenly across the other symbols.
pub fn equal_base_weights(
    symbols: &[String],
    benchmark: Option<&str>,
    benchmark_weight: Option<f64>,
) -> Result<Vec<AssetConfig>, RotatorError> {
    if symbols.is_empty() {
        return Err(RotatorError::invalid("assets", "at least one symbol is required"));
    }

    let (Some(benchmark), Some(pinned)) = (benchmark, benchmark_weight) else {
        let weight = 1.0 / symbols.len() as f64;
        return Ok(symbols.iter().map(|s| AssetConfig::new(s.clone(), weight)).collect());
    };

    if !(0.0..=1.0).contains(&pinned) {
        return Err(RotatorError::invalid("benchmark_weight", "must be between 0 and 1"));
    }
    if !symbols.iter().any(|s| s == benchmark) {
        return Err(RotatorError::invalid(
            "benchmark_weight",
            format!("benchmark {} is not one of the assets", benchmark),
        ));
    }

    let others = symbols.len() - 1;
    let other_weight = if others > 0 {
        (1.0 - pinned) / others as f64
    } else {
        0.0
    };

    Ok(symbols
        .iter()
        .map(|s| {
            let weight = if s == benchmark { pinned } else { other_weight };
            AssetConfig::new(s.clone(), weight)
        })
        .collect())
}
