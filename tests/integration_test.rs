//! End-to-end tests over the domain pipeline with an in-memory price port.

mod common;

use approx::assert_relative_eq;
use common::*;
use rotator::adapters::export;
use rotator::domain::allocation::{allocate, AllocationConfig, WeightResult};
use rotator::domain::asset::AssetConfig;
use rotator::domain::backtest::{run_backtest, BacktestConfig, MissingHistoryPolicy, StrategyMode};
use rotator::domain::error::RotatorError;
use rotator::domain::price_series::PriceSeries;
use rotator::domain::rebalance::{rebalance, Holding, OrderAction, RebalanceInput, UnitPolicy};
use rotator::domain::signal::{evaluate_all, AssetSignals, RelativeDirection, SignalConfig, TrendDirection};
use rotator::domain::sweep::{run_sweep, SweepGrid};
use rotator::ports::price_port::PricePort;
use std::collections::BTreeMap;

const DAYS: usize = 182;

fn start() -> chrono::NaiveDate {
    date(2024, 1, 1)
}

/// QQQ climbs fast, VOO climbs slowly, SPMO falls, BRK-B stays flat.
fn sample_port() -> MockPricePort {
    MockPricePort::new()
        .with_series(linear_series("VOO", start(), DAYS, 100.0, 0.1))
        .with_series(linear_series("QQQ", start(), DAYS, 100.0, 1.0))
        .with_series(linear_series("SPMO", start(), DAYS, 100.0, -0.2))
        .with_series(flat_series("BRK-B", start(), DAYS, 100.0))
}

fn short_windows() -> SignalConfig {
    SignalConfig {
        trend_window: 10,
        performance_window: 5,
    }
}

fn load(port: &dyn PricePort, assets: &[AssetConfig], end: chrono::NaiveDate) -> (Vec<PriceSeries>, PriceSeries) {
    let series: Vec<PriceSeries> = assets
        .iter()
        .map(|a| port.fetch_series(&a.symbol, chrono::NaiveDate::MIN, end).unwrap())
        .collect();
    let benchmark = series.iter().find(|s| s.symbol() == "VOO").unwrap().clone();
    (series, benchmark)
}

fn weight_of<'a>(weights: &'a [WeightResult], symbol: &str) -> &'a WeightResult {
    weights.iter().find(|w| w.symbol == symbol).unwrap()
}

fn backtest_config() -> BacktestConfig {
    let mut config = BacktestConfig::new(start(), date(2024, 6, 30), 10_000.0);
    config.signals = short_windows();
    config
}

mod signal_to_orders {
    use super::*;

    #[test]
    fn signals_allocation_and_orders() {
        let port = sample_port();
        let assets = sample_assets();
        let as_of = date(2024, 3, 10);
        let (series, benchmark) = load(&port, &assets, as_of);

        let pairs: Vec<(&AssetConfig, &PriceSeries)> = assets.iter().zip(&series).collect();
        let signals: Vec<AssetSignals> = evaluate_all(&pairs, &benchmark, as_of, &short_windows())
            .into_iter()
            .collect::<Result<_, _>>()
            .unwrap();

        let by_symbol = |s: &str| signals.iter().find(|x| x.symbol == s).unwrap();
        assert_eq!(by_symbol("QQQ").trend.direction, TrendDirection::Uptrend);
        assert_eq!(by_symbol("QQQ").relative.direction, RelativeDirection::Outperform);
        assert_eq!(by_symbol("SPMO").trend.direction, TrendDirection::Downtrend);
        assert_eq!(by_symbol("BRK-B").trend.direction, TrendDirection::Neutral);
        assert_eq!(by_symbol("BRK-B").relative.direction, RelativeDirection::Underperform);
        assert_eq!(by_symbol("VOO").relative.direction, RelativeDirection::Neutral);

        let inputs: Vec<(&AssetConfig, &AssetSignals)> = assets.iter().zip(&signals).collect();
        let weights = allocate(&inputs, &AllocationConfig::default()).unwrap();
        let total: f64 = weights.iter().map(|w| w.rounded_weight).sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-9);
        assert_relative_eq!(weight_of(&weights, "BRK-B").rounded_weight, 0.20, epsilon = 1e-9);
        assert_relative_eq!(weight_of(&weights, "QQQ").rounded_weight, 0.35, epsilon = 1e-9);
        assert_relative_eq!(weight_of(&weights, "SPMO").rounded_weight, 0.10, epsilon = 1e-9);
        assert_relative_eq!(weight_of(&weights, "VOO").rounded_weight, 0.35, epsilon = 1e-9);

        let prices: BTreeMap<String, f64> = series
            .iter()
            .map(|s| (s.symbol().to_string(), s.close_at_or_before(as_of).unwrap()))
            .collect();
        let plan = rebalance(&RebalanceInput {
            targets: &weights,
            holdings: &[],
            prices: &prices,
            cash: 10_000.0,
            policy: UnitPolicy::WholeUnits,
        })
        .unwrap();

        assert!(plan.orders.iter().all(|o| o.action == OrderAction::Buy));
        assert!(plan.orders.iter().all(|o| o.units.fract() == 0.0));
        assert!(plan.buy_cost() <= 10_000.0);
        assert_relative_eq!(plan.buy_cost() + plan.uninvested_cash, 10_000.0, epsilon = 1e-6);
        assert!(plan.unknown_prices.is_empty());
    }

    #[test]
    fn rotating_out_of_a_held_position_sells_first() {
        let weights = vec![
            WeightResult {
                symbol: "QQQ".into(),
                raw_weight: 1.0,
                normalized_weight: 1.0,
                rounded_weight: 1.0,
            },
            WeightResult {
                symbol: "SPMO".into(),
                raw_weight: 0.0,
                normalized_weight: 0.0,
                rounded_weight: 0.0,
            },
        ];
        let prices: BTreeMap<String, f64> =
            [("QQQ".to_string(), 50.0), ("SPMO".to_string(), 100.0)].into_iter().collect();
        let holdings = vec![Holding::new("SPMO", 10.0)];

        let plan = rebalance(&RebalanceInput {
            targets: &weights,
            holdings: &holdings,
            prices: &prices,
            cash: 0.0,
            policy: UnitPolicy::WholeUnits,
        })
        .unwrap();

        assert_eq!(plan.orders[0].action, OrderAction::Sell);
        assert_relative_eq!(plan.orders[0].units, 10.0);
        let buy = plan.buys().next().unwrap();
        assert_eq!(buy.symbol, "QQQ");
        assert_relative_eq!(buy.units, 20.0);
        assert_relative_eq!(plan.uninvested_cash, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn short_history_is_reported_per_asset() {
        let port = sample_port().with_series(flat_series("NEW", date(2024, 3, 5), 3, 20.0));
        let assets = vec![AssetConfig::new("VOO", 0.5), AssetConfig::new("NEW", 0.5)];
        let as_of = date(2024, 3, 7);
        let (series, benchmark) = load(&port, &assets, as_of);
        let pairs: Vec<(&AssetConfig, &PriceSeries)> = assets.iter().zip(&series).collect();

        let results = evaluate_all(&pairs, &benchmark, as_of, &short_windows());
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(RotatorError::InsufficientHistory { bars: 3, .. })
        ));
    }
}

mod backtest_pipeline {
    use super::*;

    #[test]
    fn rotation_backtest_over_half_a_year() {
        let port = sample_port();
        let assets = sample_assets();
        let config = backtest_config();
        let (series, benchmark) = load(&port, &assets, config.end_date);

        let result = run_backtest(&assets, &series, &benchmark, &config).unwrap();

        assert_eq!(result.points.len(), DAYS);
        assert_relative_eq!(result.points[0].portfolio_value, 10_000.0, epsilon = 1e-6);
        assert_relative_eq!(result.points[0].benchmark_value, 10_000.0, epsilon = 1e-6);

        let dates: Vec<_> = result.rebalances.iter().map(|r| r.date).collect();
        assert_eq!(
            dates,
            vec![
                date(2024, 1, 1),
                date(2024, 1, 31),
                date(2024, 2, 29),
                date(2024, 3, 31),
                date(2024, 4, 30),
                date(2024, 5, 31),
                date(2024, 6, 30),
            ]
        );

        let first = &result.rebalances[0];
        assert!(first.carried_forward);
        assert!(first.gain_since_previous.is_none());
        for w in &first.weights {
            assert_relative_eq!(w.rounded_weight, 0.25, epsilon = 1e-9);
        }

        let second = &result.rebalances[1];
        assert!(!second.carried_forward);
        assert!(second.gain_since_previous.is_some());
        assert_relative_eq!(weight_of(&second.weights, "QQQ").rounded_weight, 0.35, epsilon = 1e-9);
        assert_relative_eq!(weight_of(&second.weights, "SPMO").rounded_weight, 0.10, epsilon = 1e-9);

        let benchmark_end = 10_000.0 / 100.0 * (100.0 + 0.1 * (DAYS - 1) as f64);
        assert_relative_eq!(result.points.last().unwrap().benchmark_value, benchmark_end, epsilon = 1e-6);
        assert!(result.final_value().unwrap() > 10_000.0);
    }

    #[test]
    fn fixed_weights_keeps_neutral_allocation() {
        let port = sample_port();
        let assets = sample_assets();
        let mut config = backtest_config();
        config.mode = StrategyMode::FixedWeights;
        let (series, benchmark) = load(&port, &assets, config.end_date);

        let result = run_backtest(&assets, &series, &benchmark, &config).unwrap();
        for record in &result.rebalances {
            for w in &record.weights {
                assert_relative_eq!(w.rounded_weight, 0.25, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn repeated_runs_are_identical() {
        let port = sample_port();
        let assets = sample_assets();
        let config = backtest_config();
        let (series, benchmark) = load(&port, &assets, config.end_date);

        let a = run_backtest(&assets, &series, &benchmark, &config).unwrap();
        let b = run_backtest(&assets, &series, &benchmark, &config).unwrap();
        assert_eq!(a.points, b.points);
        assert_eq!(a.rebalances, b.rebalances);
    }

    #[test]
    fn flat_market_matches_benchmark() {
        let assets = vec![AssetConfig::new("VOO", 0.5), AssetConfig::new("QQQ", 0.5)];
        let port = MockPricePort::new()
            .with_series(flat_series("VOO", start(), DAYS, 400.0))
            .with_series(flat_series("QQQ", start(), DAYS, 350.0));
        let config = backtest_config();
        let (series, benchmark) = load(&port, &assets, config.end_date);

        let result = run_backtest(&assets, &series, &benchmark, &config).unwrap();
        for p in &result.points {
            assert_relative_eq!(p.portfolio_value, p.benchmark_value, epsilon = 1e-6);
        }
        let metrics = result.portfolio_metrics(0.0);
        assert_relative_eq!(metrics.total_return, 0.0, epsilon = 1e-9);
        assert_relative_eq!(metrics.max_drawdown, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn late_listing_excluded_until_history_exists() {
        let assets = vec![AssetConfig::new("VOO", 0.5), AssetConfig::new("NEW", 0.5)];
        let port = MockPricePort::new()
            .with_series(linear_series("VOO", start(), DAYS, 100.0, 0.1))
            .with_series(linear_series("NEW", date(2024, 3, 1), 122, 50.0, 0.5));
        let mut config = backtest_config();
        config.missing_history = MissingHistoryPolicy::ExcludeAsset;
        let (series, benchmark) = load(&port, &assets, config.end_date);

        let result = run_backtest(&assets, &series, &benchmark, &config).unwrap();
        let january = result.rebalances.iter().find(|r| r.date == date(2024, 1, 31)).unwrap();
        assert!(!january.carried_forward);
        assert_relative_eq!(weight_of(&january.weights, "NEW").rounded_weight, 0.0);
        assert_relative_eq!(weight_of(&january.weights, "VOO").rounded_weight, 1.0, epsilon = 1e-9);

        let april = result.rebalances.iter().find(|r| r.date == date(2024, 4, 30)).unwrap();
        assert!(weight_of(&april.weights, "NEW").rounded_weight > 0.0);
    }

    #[test]
    fn curve_exports_as_csv() {
        let port = sample_port();
        let assets = sample_assets();
        let config = backtest_config();
        let (series, benchmark) = load(&port, &assets, config.end_date);
        let result = run_backtest(&assets, &series, &benchmark, &config).unwrap();

        let mut buf = Vec::new();
        export::write_backtest_csv(&mut buf, &result.points).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("date,portfolio_value,benchmark_value"));
        assert_eq!(lines.count(), DAYS);
    }

    #[test]
    fn missing_asset_series_is_no_data() {
        let assets = vec![AssetConfig::new("VOO", 0.5), AssetConfig::new("GONE", 0.5)];
        let voo = linear_series("VOO", start(), DAYS, 100.0, 0.1);
        let err = run_backtest(&assets, &[voo.clone()], &voo, &backtest_config()).unwrap_err();
        assert!(matches!(err, RotatorError::NoData { symbol } if symbol == "GONE"));
    }
}

mod sweep_pipeline {
    use super::*;

    #[test]
    fn sweep_ranks_every_case() {
        let port = sample_port();
        let assets = sample_assets();
        let config = backtest_config();
        let (series, benchmark) = load(&port, &assets, config.end_date);
        let grid = SweepGrid {
            trend_adjustments: vec![0.0, 0.1],
            relative_adjustments: vec![0.05],
            pinned_weights: vec![None],
            modes: vec![StrategyMode::Rotation, StrategyMode::FixedWeights],
        };

        let outcomes = run_sweep(&assets, &series, &benchmark, &config, &grid).unwrap();
        assert_eq!(outcomes.len(), 4);
        for pair in outcomes.windows(2) {
            assert!(pair[0].total_return >= pair[1].total_return);
        }
        let mut indexes: Vec<usize> = outcomes.iter().map(|o| o.case.index).collect();
        indexes.sort();
        assert_eq!(indexes, vec![0, 1, 2, 3]);

        let mut buf = Vec::new();
        export::write_sweep_csv(&mut buf, &outcomes).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap().lines().count(), 5);
    }
}

mod price_port {
    use super::*;

    #[test]
    fn port_errors_propagate() {
        let port = sample_port().with_error("QQQ", "feed offline");
        let err = port
            .fetch_series("QQQ", chrono::NaiveDate::MIN, date(2024, 6, 30))
            .unwrap_err();
        assert!(matches!(err, RotatorError::Data { .. }));
    }

    #[test]
    fn out_of_range_is_no_data() {
        let port = sample_port();
        let err = port
            .fetch_series("VOO", date(2025, 1, 1), date(2025, 2, 1))
            .unwrap_err();
        assert!(matches!(err, RotatorError::NoData { .. }));
    }

    #[test]
    fn lists_known_symbols() {
        assert_eq!(
            sample_port().list_symbols().unwrap(),
            vec!["BRK-B", "QQQ", "SPMO", "VOO"]
        );
    }
}
