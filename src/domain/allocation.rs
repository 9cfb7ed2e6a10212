//! Target weight allocation.
//!
//! raw        = base + trend adjustment + relative adjustment
//! clamped    = clamp(raw, floor, cap)
//! normalized = clamped / sum(clamped)
//! rounded    = normalized snapped to the rounding step, residual reconciled
//!              by largest remainder (ties by symbol) so the set sums to 1.0
//!
//! Rounding is done in integer step units: with a 0.05 step the allocation is
//! twenty units distributed across the assets.

use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeSet;

use super::asset::AssetConfig;
use super::error::RotatorError;
use super::signal::AssetSignals;

pub const DEFAULT_ROUNDING_STEP: f64 = 0.05;
pub const WEIGHT_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct AllocationConfig {
    pub rounding_step: f64,
    pub weight_floor: f64,
    pub weight_cap: Option<f64>,
    /// Symbol whose base weight is held fixed while the others rotate.
    pub pinned: Option<String>,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        AllocationConfig {
            rounding_step: DEFAULT_ROUNDING_STEP,
            weight_floor: 0.0,
            weight_cap: None,
            pinned: None,
        }
    }
}

impl AllocationConfig {
    /// Number of rounding steps that make up a full allocation.
    pub fn step_units(&self) -> Result<i64, RotatorError> {
        let step = self.rounding_step;
        if !step.is_finite() || step <= 0.0 || step > 1.0 {
            return Err(RotatorError::invalid("rounding_step", "must be in (0, 1]"));
        }
        let units = (1.0 / step).round();
        if (units * step - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(RotatorError::invalid(
                "rounding_step",
                format!("{} does not divide 1.0 evenly", step),
            ));
        }
        Ok(units as i64)
    }

    pub fn validate(&self) -> Result<(), RotatorError> {
        self.step_units()?;
        if !self.weight_floor.is_finite() || self.weight_floor < 0.0 {
            return Err(RotatorError::invalid("weight_floor", "must be non-negative"));
        }
        if let Some(cap) = self.weight_cap {
            if !cap.is_finite() || cap < self.weight_floor {
                return Err(RotatorError::invalid(
                    "weight_cap",
                    "must be a number no lower than weight_floor",
                ));
            }
        }
        Ok(())
    }

    fn clamp(&self, raw: f64) -> f64 {
        let floored = raw.max(self.weight_floor);
        match self.weight_cap {
            Some(cap) => floored.min(cap),
            None => floored,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightResult {
    pub symbol: String,
    pub raw_weight: f64,
    pub normalized_weight: f64,
    pub rounded_weight: f64,
}

struct Entry<'a> {
    symbol: &'a str,
    raw: f64,
    clamped: f64,
    pinned: bool,
}

/// Combines base weights and signals into a rounded allocation summing to 1.0.
pub fn allocate(
    inputs: &[(&AssetConfig, &AssetSignals)],
    config: &AllocationConfig,
) -> Result<Vec<WeightResult>, RotatorError> {
    config.validate()?;
    let total_units = config.step_units()?;

    let mut seen = BTreeSet::new();
    for (asset, signals) in inputs {
        asset.validate()?;
        if asset.symbol != signals.symbol {
            return Err(RotatorError::invalid(
                "signals",
                format!("signals for {} paired with asset {}", signals.symbol, asset.symbol),
            ));
        }
        if !seen.insert(asset.symbol.as_str()) {
            return Err(RotatorError::invalid(
                "assets",
                format!("duplicate symbol {}", asset.symbol),
            ));
        }
    }
    if let Some(pinned) = &config.pinned {
        if !seen.contains(pinned.as_str()) {
            return Err(RotatorError::invalid(
                "pinned",
                format!("{} is not one of the assets", pinned),
            ));
        }
    }

    let mut entries: Vec<Entry> = inputs
        .iter()
        .map(|(asset, signals)| {
            let pinned = config.pinned.as_deref() == Some(asset.symbol.as_str()) && inputs.len() > 1;
            let raw = if pinned {
                asset.base_weight
            } else {
                asset.base_weight + signals.total_adjustment()
            };
            Entry {
                symbol: asset.symbol.as_str(),
                raw,
                clamped: if pinned { raw } else { config.clamp(raw) },
                pinned,
            }
        })
        .collect();
    entries.sort_by(|a, b| a.symbol.cmp(b.symbol));

    let normalized = normalize(&entries)?;

    let exact: Vec<f64> = normalized.iter().map(|w| w * total_units as f64).collect();
    let mut units: Vec<i64> = exact.iter().map(|e| e.round().max(0.0) as i64).collect();
    let remainders: Vec<f64> = exact
        .iter()
        .zip(&units)
        .map(|(e, &u)| e - u as f64)
        .collect();

    let rotating: Vec<usize> = (0..entries.len()).filter(|&i| !entries[i].pinned).collect();
    let symbols: Vec<&str> = entries.iter().map(|e| e.symbol).collect();
    reconcile(&mut units, &remainders, &symbols, &rotating, total_units);
    let everyone: Vec<usize> = (0..entries.len()).collect();
    reconcile(&mut units, &remainders, &symbols, &everyone, total_units);

    Ok(entries
        .iter()
        .zip(normalized)
        .zip(units)
        .map(|((entry, normalized_weight), u)| WeightResult {
            symbol: entry.symbol.to_string(),
            raw_weight: entry.raw,
            normalized_weight,
            rounded_weight: u as f64 / total_units as f64,
        })
        .collect())
}

/// Allocation with every signal neutral: the base weights, normalized and
/// rounded.
pub fn neutral_allocation(
    assets: &[AssetConfig],
    as_of: NaiveDate,
    config: &AllocationConfig,
) -> Result<Vec<WeightResult>, RotatorError> {
    let signals: Vec<AssetSignals> = assets
        .iter()
        .map(|a| AssetSignals::neutral(a, as_of))
        .collect();
    let inputs: Vec<(&AssetConfig, &AssetSignals)> = assets.iter().zip(&signals).collect();
    allocate(&inputs, config)
}

fn normalize(entries: &[Entry]) -> Result<Vec<f64>, RotatorError> {
    if entries.is_empty() {
        return Err(RotatorError::DegenerateAllocation {
            reason: "no assets to allocate".into(),
        });
    }

    let pinned_weight: f64 = entries.iter().filter(|e| e.pinned).map(|e| e.clamped).sum();
    let remaining = 1.0 - pinned_weight;
    let rotating_sum: f64 = entries.iter().filter(|e| !e.pinned).map(|e| e.clamped).sum();

    if rotating_sum <= 0.0 && (pinned_weight == 0.0 || remaining > WEIGHT_TOLERANCE) {
        return Err(RotatorError::DegenerateAllocation {
            reason: "every rotating weight was clamped to zero".into(),
        });
    }

    Ok(entries
        .iter()
        .map(|e| {
            if e.pinned {
                e.clamped
            } else if rotating_sum > 0.0 {
                e.clamped / rotating_sum * remaining
            } else {
                0.0
            }
        })
        .collect())
}

/// Applies the rounding residual one step at a time in largest-remainder
/// order. Short allocations gain steps where rounding cut the most; long
/// allocations lose steps where rounding added the most, never below zero.
fn reconcile(units: &mut [i64], remainders: &[f64], symbols: &[&str], candidates: &[usize], total: i64) {
    let mut residual = total - units.iter().sum::<i64>();
    if residual == 0 || candidates.is_empty() {
        return;
    }

    let mut order = candidates.to_vec();
    order.sort_by(|&a, &b| {
        let by_remainder = if residual > 0 {
            remainders[b].total_cmp(&remainders[a])
        } else {
            remainders[a].total_cmp(&remainders[b])
        };
        match by_remainder {
            Ordering::Equal => symbols[a].cmp(symbols[b]),
            other => other,
        }
    });

    tracing::debug!(residual, "reconciling rounding residual");

    while residual != 0 {
        let mut progressed = false;
        for &i in &order {
            if residual > 0 {
                units[i] += 1;
                residual -= 1;
                progressed = true;
            } else if residual < 0 && units[i] > 0 {
                units[i] -= 1;
                residual += 1;
                progressed = true;
            }
            if residual == 0 {
                break;
            }
        }
        if !progressed {
            break;
        }
    }
}
