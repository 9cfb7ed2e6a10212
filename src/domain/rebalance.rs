//! Order generation from target weights.
//!
//! Implements the value-delta rebalance:
//! 1. total = cash + sum(units * price) over priced symbols
//! 2. delta = weight * total - units * price per symbol
//! 3. sells first (raising cash), then buys scaled to fit cash + proceeds
//! 4. units floored under the whole-unit policy; leftover cash is reported

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::allocation::WeightResult;
use super::error::RotatorError;

const VALUE_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnitPolicy {
    Fractional,
    #[default]
    WholeUnits,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub symbol: String,
    pub units: f64,
    /// Informational only.
    pub cost_basis: Option<f64>,
}

impl Holding {
    pub fn new(symbol: impl Into<String>, units: f64) -> Self {
        Holding {
            symbol: symbol.into(),
            units,
            cost_basis: None,
        }
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.units * price
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderAction {
    Buy,
    Sell,
}

impl fmt::Display for OrderAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderAction::Buy => write!(f, "BUY"),
            OrderAction::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub symbol: String,
    pub action: OrderAction,
    pub units: f64,
    pub price: f64,
    pub estimated_amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartialFillReason {
    /// Buy demand exceeded available cash and was scaled down.
    CashConstrained,
    /// The intended trade rounded to zero whole units.
    UnitRounding,
}

/// A symbol whose intended trade could not be executed in full.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialFill {
    pub symbol: String,
    pub requested_value: f64,
    pub filled_value: f64,
    pub reason: PartialFillReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RebalanceInput<'a> {
    pub targets: &'a [WeightResult],
    pub holdings: &'a [Holding],
    pub prices: &'a BTreeMap<String, f64>,
    pub cash: f64,
    pub policy: UnitPolicy,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RebalancePlan {
    pub total_value: f64,
    pub orders: Vec<Order>,
    pub partial_fills: Vec<PartialFill>,
    /// One `UnknownPrice` per symbol that needed a trade but had no quote.
    pub unknown_prices: Vec<RotatorError>,
    /// Cash plus sell proceeds.
    pub available_cash: f64,
    pub uninvested_cash: f64,
}

impl RebalancePlan {
    pub fn sells(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter().filter(|o| o.action == OrderAction::Sell)
    }

    pub fn buys(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter().filter(|o| o.action == OrderAction::Buy)
    }

    pub fn buy_cost(&self) -> f64 {
        self.buys().map(|o| o.estimated_amount).sum()
    }

    pub fn sell_proceeds(&self) -> f64 {
        self.sells().map(|o| o.estimated_amount).sum()
    }
}

struct Line<'a> {
    symbol: &'a str,
    price: f64,
    held: f64,
    delta: f64,
}

fn units_for(value: f64, price: f64, policy: UnitPolicy) -> f64 {
    let units = value / price;
    match policy {
        UnitPolicy::Fractional => units,
        UnitPolicy::WholeUnits => units.floor(),
    }
}

fn validate(input: &RebalanceInput) -> Result<(), RotatorError> {
    if !input.cash.is_finite() || input.cash < 0.0 {
        return Err(RotatorError::invalid("cash", "must be a non-negative amount"));
    }
    let mut seen = BTreeSet::new();
    for h in input.holdings {
        if !h.units.is_finite() || h.units < 0.0 {
            return Err(RotatorError::invalid(
                "units",
                format!("{} holds {} units", h.symbol, h.units),
            ));
        }
        if !seen.insert(h.symbol.as_str()) {
            return Err(RotatorError::invalid(
                "holdings",
                format!("duplicate holding {}", h.symbol),
            ));
        }
    }
    let mut seen = BTreeSet::new();
    for t in input.targets {
        if !t.rounded_weight.is_finite() || t.rounded_weight < 0.0 {
            return Err(RotatorError::invalid(
                "targets",
                format!("{} has weight {}", t.symbol, t.rounded_weight),
            ));
        }
        if !seen.insert(t.symbol.as_str()) {
            return Err(RotatorError::invalid(
                "targets",
                format!("duplicate target {}", t.symbol),
            ));
        }
    }
    Ok(())
}

/// Turns target weights into sell-then-buy orders that the account can
/// afford.
pub fn rebalance(input: &RebalanceInput) -> Result<RebalancePlan, RotatorError> {
    validate(input)?;

    let weights: BTreeMap<&str, f64> = input
        .targets
        .iter()
        .map(|t| (t.symbol.as_str(), t.rounded_weight))
        .collect();
    let held: BTreeMap<&str, f64> = input
        .holdings
        .iter()
        .map(|h| (h.symbol.as_str(), h.units))
        .collect();
    let symbols: BTreeSet<&str> = weights.keys().chain(held.keys()).copied().collect();

    let mut plan = RebalancePlan::default();
    let mut priced: Vec<(&str, f64, f64, f64)> = Vec::with_capacity(symbols.len());

    for symbol in symbols {
        let weight = weights.get(symbol).copied().unwrap_or(0.0);
        let units = held.get(symbol).copied().unwrap_or(0.0);
        if weight == 0.0 && units == 0.0 {
            continue;
        }
        match input.prices.get(symbol).copied().filter(|p| p.is_finite() && *p > 0.0) {
            Some(price) => priced.push((symbol, price, units, weight)),
            None => {
                tracing::warn!(symbol, "no price quote, skipping symbol");
                plan.unknown_prices.push(RotatorError::UnknownPrice {
                    symbol: symbol.to_string(),
                });
            }
        }
    }

    let quoted: BTreeMap<&str, f64> = priced.iter().map(|&(symbol, price, _, _)| (symbol, price)).collect();
    let total_value = input.cash
        + input
            .holdings
            .iter()
            .filter_map(|h| quoted.get(h.symbol.as_str()).map(|&price| h.market_value(price)))
            .sum::<f64>();
    plan.total_value = total_value;
    let tolerance = VALUE_TOLERANCE * total_value.max(1.0);

    let lines: Vec<Line> = priced
        .into_iter()
        .map(|(symbol, price, units, weight)| Line {
            symbol,
            price,
            held: units,
            delta: weight * total_value - units * price,
        })
        .filter(|line| line.delta.abs() > tolerance)
        .collect();

    let mut proceeds = 0.0;
    for line in lines.iter().filter(|l| l.delta < 0.0) {
        let wanted = units_for(-line.delta + tolerance, line.price, input.policy);
        let units = wanted.min(line.held);
        if units <= 0.0 {
            plan.partial_fills.push(PartialFill {
                symbol: line.symbol.to_string(),
                requested_value: line.delta,
                filled_value: 0.0,
                reason: PartialFillReason::UnitRounding,
            });
            continue;
        }
        let amount = units * line.price;
        proceeds += amount;
        plan.orders.push(Order {
            symbol: line.symbol.to_string(),
            action: OrderAction::Sell,
            units,
            price: line.price,
            estimated_amount: amount,
        });
    }

    let available = input.cash + proceeds;
    plan.available_cash = available;

    let demand: f64 = lines.iter().filter(|l| l.delta > 0.0).map(|l| l.delta).sum();
    let scale = if demand > available { available / demand } else { 1.0 };
    if scale < 1.0 {
        tracing::warn!(demand, available, "buy demand exceeds cash, scaling buys");
    }

    let mut spent = 0.0;
    for line in lines.iter().filter(|l| l.delta > 0.0) {
        let budget = (line.delta * scale).min(available - spent).max(0.0);
        let units = units_for(budget, line.price, input.policy);
        let amount = match input.policy {
            UnitPolicy::Fractional => budget,
            UnitPolicy::WholeUnits => (units * line.price).min(available - spent),
        };

        if units <= 0.0 {
            plan.partial_fills.push(PartialFill {
                symbol: line.symbol.to_string(),
                requested_value: line.delta,
                filled_value: 0.0,
                reason: if scale < 1.0 {
                    PartialFillReason::CashConstrained
                } else {
                    PartialFillReason::UnitRounding
                },
            });
            continue;
        }
        if scale < 1.0 {
            plan.partial_fills.push(PartialFill {
                symbol: line.symbol.to_string(),
                requested_value: line.delta,
                filled_value: amount,
                reason: PartialFillReason::CashConstrained,
            });
        }

        spent += amount;
        plan.orders.push(Order {
            symbol: line.symbol.to_string(),
            action: OrderAction::Buy,
            units,
            price: line.price,
            estimated_amount: amount,
        });
    }

    plan.uninvested_cash = (available - spent).max(0.0);
    Ok(plan)
}
