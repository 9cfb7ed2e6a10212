//! Core domain types and logic.

pub mod price_series;
pub mod asset;
pub mod signal;
pub mod allocation;
pub mod rebalance;
pub mod timeline;
pub mod backtest;
pub mod metrics;
pub mod sweep;
pub mod config_validation;
pub mod error;
