//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::{load_holdings, CsvPriceAdapter};
use crate::adapters::export;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::allocation::{allocate, AllocationConfig, WeightResult, DEFAULT_ROUNDING_STEP};
use crate::domain::asset::{
    equal_base_weights, AssetConfig, DEFAULT_RELATIVE_ADJUSTMENT, DEFAULT_TREND_ADJUSTMENT,
};
use crate::domain::backtest::{run_backtest, BacktestConfig, StrategyMode};
use crate::domain::config_validation::{
    asset_symbols, optional_double, optional_parsed, optional_usize, parse_date,
    validate_backtest_config, validate_portfolio_config, validate_rebalance_config,
    ASSET_SECTION_PREFIX,
};
use crate::domain::error::RotatorError;
use crate::domain::metrics::Metrics;
use crate::domain::price_series::PriceSeries;
use crate::domain::rebalance::{rebalance, Holding, RebalanceInput, UnitPolicy};
use crate::domain::signal::{
    evaluate_all, AssetSignals, SignalConfig, DEFAULT_PERFORMANCE_WINDOW, DEFAULT_TREND_WINDOW,
};
use crate::domain::sweep::{run_sweep, SweepGrid};
use crate::logging::{init_logging, LogFormat};
use crate::ports::config_port::ConfigPort;
use crate::ports::price_port::PricePort;

const DEFAULT_INITIAL_CAPITAL: f64 = 10_000.0;
const DEFAULT_PRICE_DIR: &str = "prices";

#[derive(Parser, Debug)]
#[command(name = "rotator", about = "Signal-driven portfolio rotation and rebalancing")]
pub struct Cli {
    /// Log level, overriding [logging] level
    #[arg(long, global = true)]
    pub log_level: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show trend and relative-performance signals per asset
    Signals {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// Compute target weights
    Allocate {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        as_of: Option<NaiveDate>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Generate orders that move current holdings to the target weights
    Rebalance {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        as_of: Option<NaiveDate>,
        #[arg(long)]
        cash: Option<f64>,
        #[arg(long)]
        holdings: Option<PathBuf>,
        #[arg(long)]
        fractional: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Simulate the strategy over [backtest] start_date..end_date
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run one backtest per [sweep] grid case and rank them
    Sweep {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

impl Command {
    fn config_path(&self) -> &Path {
        match self {
            Command::Signals { config, .. }
            | Command::Allocate { config, .. }
            | Command::Rebalance { config, .. }
            | Command::Backtest { config, .. }
            | Command::Sweep { config, .. }
            | Command::Validate { config } => config.as_path(),
        }
    }
}

pub fn run(cli: Cli) -> ExitCode {
    let config_path = cli.command.config_path().to_path_buf();
    let adapter = match load_config(&config_path) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let level = cli
        .log_level
        .or_else(|| adapter.get_string("logging", "level"))
        .unwrap_or_else(|| "info".to_string());
    let format = adapter
        .get_string("logging", "format")
        .map(|f| LogFormat::parse(&f))
        .unwrap_or_default();
    init_logging(&level, format);
    tracing::info!(config = %config_path.display(), "loaded config");

    let base_dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let result = match cli.command {
        Command::Signals { as_of, .. } => run_signals(&adapter, &base_dir, as_of),
        Command::Allocate { as_of, output, .. } => {
            run_allocate(&adapter, &base_dir, as_of, output.as_deref())
        }
        Command::Rebalance {
            as_of,
            cash,
            holdings,
            fractional,
            output,
            ..
        } => run_rebalance(
            &adapter,
            &base_dir,
            RebalanceArgs {
                as_of,
                cash,
                holdings,
                fractional,
                output,
            },
        ),
        Command::Backtest { output, .. } => run_backtest_command(&adapter, &base_dir, output.as_deref()),
        Command::Sweep { output, .. } => run_sweep_command(&adapter, &base_dir, output.as_deref()),
        Command::Validate { .. } => run_validate(&adapter, &base_dir),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, RotatorError> {
    FileConfigAdapter::from_file(path).map_err(|e| RotatorError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Relative paths in the config resolve against the config file's directory.
fn resolve_path(base_dir: &Path, value: &str) -> PathBuf {
    let path = PathBuf::from(value.trim());
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}

pub fn benchmark_symbol(config: &dyn ConfigPort) -> Result<String, RotatorError> {
    config
        .get_string("portfolio", "benchmark")
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty())
        .ok_or_else(|| RotatorError::ConfigMissing {
            section: "portfolio".into(),
            key: "benchmark".into(),
        })
}

/// Asset list from `[portfolio]` with `[asset:SYMBOL]` overrides applied.
pub fn build_assets(config: &dyn ConfigPort) -> Result<Vec<AssetConfig>, RotatorError> {
    let symbols = asset_symbols(config);
    let benchmark = benchmark_symbol(config)?;
    let benchmark_weight = optional_double(config, "portfolio", "benchmark_weight")?;

    let mut assets = equal_base_weights(&symbols, Some(&benchmark), benchmark_weight)?;
    for asset in &mut assets {
        let section = format!("{}{}", ASSET_SECTION_PREFIX, asset.symbol);
        if let Some(base) = optional_double(config, &section, "base_weight")? {
            asset.base_weight = base;
        }
        if let Some(trend) = optional_double(config, &section, "trend_adjustment")? {
            asset.trend_adjustment = trend;
        }
        if let Some(relative) = optional_double(config, &section, "relative_adjustment")? {
            asset.relative_adjustment = relative;
        }
        asset.validate()?;
    }
    Ok(assets)
}

pub fn build_signal_config(config: &dyn ConfigPort) -> Result<SignalConfig, RotatorError> {
    let signals = SignalConfig {
        trend_window: optional_usize(config, "signals", "trend_window")?.unwrap_or(DEFAULT_TREND_WINDOW),
        performance_window: optional_usize(config, "signals", "performance_window")?
            .unwrap_or(DEFAULT_PERFORMANCE_WINDOW),
    };
    signals.validate()?;
    Ok(signals)
}

pub fn build_allocation_config(config: &dyn ConfigPort) -> Result<AllocationConfig, RotatorError> {
    let pinned = if config.get_bool("allocation", "pin_benchmark", false) {
        Some(benchmark_symbol(config)?)
    } else {
        None
    };
    let allocation = AllocationConfig {
        rounding_step: optional_double(config, "allocation", "rounding_step")?
            .unwrap_or(DEFAULT_ROUNDING_STEP),
        weight_floor: optional_double(config, "allocation", "weight_floor")?.unwrap_or(0.0),
        weight_cap: optional_double(config, "allocation", "weight_cap")?,
        pinned,
    };
    allocation.validate()?;
    Ok(allocation)
}

pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, RotatorError> {
    let start_date = parse_date(config.get_string("backtest", "start_date").as_deref(), "backtest", "start_date")?;
    let end_date = parse_date(config.get_string("backtest", "end_date").as_deref(), "backtest", "end_date")?;
    let initial_capital =
        optional_double(config, "backtest", "initial_capital")?.unwrap_or(DEFAULT_INITIAL_CAPITAL);

    let defaults = BacktestConfig::new(start_date, end_date, initial_capital);
    let bt = BacktestConfig {
        cadence: optional_parsed(config, "backtest", "cadence")?.unwrap_or(defaults.cadence),
        signals: build_signal_config(config)?,
        allocation: build_allocation_config(config)?,
        missing_history: optional_parsed(config, "backtest", "missing_history")?
            .unwrap_or(defaults.missing_history),
        mode: optional_parsed(config, "backtest", "mode")?.unwrap_or(defaults.mode),
        risk_free_rate: optional_double(config, "backtest", "risk_free_rate")?.unwrap_or(0.0),
        ..defaults
    };
    bt.validate()?;
    Ok(bt)
}

fn parse_number_list(config: &dyn ConfigPort, key: &str) -> Result<Vec<f64>, RotatorError> {
    config
        .get_list("sweep", key)
        .iter()
        .map(|item| {
            item.parse::<f64>().map_err(|_| RotatorError::ConfigInvalid {
                section: "sweep".into(),
                key: key.into(),
                reason: format!("'{}' is not a number", item),
            })
        })
        .collect()
}

pub fn build_sweep_grid(config: &dyn ConfigPort) -> Result<SweepGrid, RotatorError> {
    let mut trend_adjustments = parse_number_list(config, "trend_adjustments")?;
    if trend_adjustments.is_empty() {
        trend_adjustments.push(DEFAULT_TREND_ADJUSTMENT);
    }
    let mut relative_adjustments = parse_number_list(config, "relative_adjustments")?;
    if relative_adjustments.is_empty() {
        relative_adjustments.push(DEFAULT_RELATIVE_ADJUSTMENT);
    }

    let mut pinned_weights = Vec::new();
    for item in config.get_list("sweep", "pinned_weights") {
        if item.eq_ignore_ascii_case("none") {
            pinned_weights.push(None);
        } else {
            let weight = item.parse::<f64>().map_err(|_| RotatorError::ConfigInvalid {
                section: "sweep".into(),
                key: "pinned_weights".into(),
                reason: format!("'{}' is not a number or 'none'", item),
            })?;
            pinned_weights.push(Some(weight));
        }
    }
    if pinned_weights.is_empty() {
        pinned_weights.push(None);
    }

    let mut modes = Vec::new();
    for item in config.get_list("sweep", "modes") {
        modes.push(item.parse::<StrategyMode>().map_err(|e| RotatorError::ConfigInvalid {
            section: "sweep".into(),
            key: "modes".into(),
            reason: e.to_string(),
        })?);
    }
    if modes.is_empty() {
        modes.push(StrategyMode::Rotation);
    }

    let grid = SweepGrid {
        trend_adjustments,
        relative_adjustments,
        pinned_weights,
        modes,
    };
    grid.validate()?;
    Ok(grid)
}

fn price_adapter(config: &dyn ConfigPort, base_dir: &Path) -> CsvPriceAdapter {
    let dir = config
        .get_string("data", "price_dir")
        .unwrap_or_else(|| DEFAULT_PRICE_DIR.to_string());
    CsvPriceAdapter::new(resolve_path(base_dir, &dir))
}

/// Asset series in asset order plus the benchmark series.
fn load_universe(
    port: &dyn PricePort,
    assets: &[AssetConfig],
    benchmark: &str,
    end: NaiveDate,
) -> Result<(Vec<PriceSeries>, PriceSeries), RotatorError> {
    let mut series = Vec::with_capacity(assets.len());
    for asset in assets {
        series.push(port.fetch_series(&asset.symbol, NaiveDate::MIN, end)?);
    }
    let benchmark_series = match series.iter().find(|s| s.symbol() == benchmark) {
        Some(s) => s.clone(),
        None => port.fetch_series(benchmark, NaiveDate::MIN, end)?,
    };
    tracing::info!(assets = series.len(), benchmark, "loaded price data");
    Ok((series, benchmark_series))
}

fn resolve_as_of(requested: Option<NaiveDate>, benchmark: &PriceSeries) -> Result<NaiveDate, RotatorError> {
    match requested {
        Some(date) => Ok(date),
        None => benchmark.last_date().ok_or_else(|| RotatorError::NoData {
            symbol: benchmark.symbol().to_string(),
        }),
    }
}

struct Evaluation {
    as_of: NaiveDate,
    series: Vec<PriceSeries>,
    signals: Vec<Result<AssetSignals, RotatorError>>,
}

fn evaluate_portfolio(
    config: &dyn ConfigPort,
    base_dir: &Path,
    assets: &[AssetConfig],
    as_of: Option<NaiveDate>,
) -> Result<Evaluation, RotatorError> {
    validate_portfolio_config(config)?;
    let benchmark = benchmark_symbol(config)?;
    let signal_config = build_signal_config(config)?;
    let port = price_adapter(config, base_dir);

    let (series, benchmark_series) = load_universe(&port, assets, &benchmark, as_of.unwrap_or(NaiveDate::MAX))?;
    let as_of = resolve_as_of(as_of, &benchmark_series)?;

    let pairs: Vec<(&AssetConfig, &PriceSeries)> = assets.iter().zip(&series).collect();
    let signals = evaluate_all(&pairs, &benchmark_series, as_of, &signal_config);
    Ok(Evaluation { as_of, series, signals })
}

fn compute_targets(
    config: &dyn ConfigPort,
    assets: &[AssetConfig],
    evaluation: Evaluation,
) -> Result<(Vec<AssetSignals>, Vec<WeightResult>), RotatorError> {
    let allocation = build_allocation_config(config)?;
    let signals: Vec<AssetSignals> = evaluation.signals.into_iter().collect::<Result<_, _>>()?;
    let inputs: Vec<(&AssetConfig, &AssetSignals)> = assets.iter().zip(&signals).collect();
    let weights = allocate(&inputs, &allocation)?;
    Ok((signals, weights))
}

fn open_output(path: &Path) -> Result<File, RotatorError> {
    File::create(path).map_err(|e| RotatorError::Io(format!("failed to create {}: {}", path.display(), e)))
}

fn print_signal_row(s: &AssetSignals) {
    println!(
        "{:<8} {:>10.2} {:>10.2} {:>8.2}% {:>8.2}%  {:<10} {:<12} {:>+6.2}",
        s.symbol,
        s.close,
        s.sma,
        s.asset_return * 100.0,
        s.benchmark_return * 100.0,
        s.trend.direction.to_string(),
        s.relative.direction.to_string(),
        s.total_adjustment(),
    );
}

fn run_signals(config: &dyn ConfigPort, base_dir: &Path, as_of: Option<NaiveDate>) -> Result<(), RotatorError> {
    let assets = build_assets(config)?;
    let evaluation = evaluate_portfolio(config, base_dir, &assets, as_of)?;

    println!("=== Signals as of {} ===", evaluation.as_of);
    println!(
        "{:<8} {:>10} {:>10} {:>9} {:>9}  {:<10} {:<12} {:>6}",
        "SYMBOL", "CLOSE", "SMA", "RETURN", "BENCH", "TREND", "RELATIVE", "ADJ"
    );

    let mut first_error = None;
    for (asset, result) in assets.iter().zip(&evaluation.signals) {
        match result {
            Ok(signals) => print_signal_row(signals),
            Err(e) => {
                println!("{:<8} {}", asset.symbol, e);
                first_error.get_or_insert_with(|| e.clone());
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn print_weights(weights: &[WeightResult]) {
    println!("{:<8} {:>8} {:>11} {:>8}", "SYMBOL", "RAW", "NORMALIZED", "TARGET");
    for w in weights {
        println!(
            "{:<8} {:>7.2}% {:>10.2}% {:>7.2}%",
            w.symbol,
            w.raw_weight * 100.0,
            w.normalized_weight * 100.0,
            w.rounded_weight * 100.0
        );
    }
}

fn run_allocate(
    config: &dyn ConfigPort,
    base_dir: &Path,
    as_of: Option<NaiveDate>,
    output: Option<&Path>,
) -> Result<(), RotatorError> {
    let assets = build_assets(config)?;
    let evaluation = evaluate_portfolio(config, base_dir, &assets, as_of)?;
    let as_of = evaluation.as_of;
    let (_, weights) = compute_targets(config, &assets, evaluation)?;

    println!("=== Target weights as of {} ===", as_of);
    print_weights(&weights);

    if let Some(path) = output {
        export::write_weights_csv(open_output(path)?, &weights)?;
        tracing::info!(path = %path.display(), "weights written");
    }
    Ok(())
}

struct RebalanceArgs {
    as_of: Option<NaiveDate>,
    cash: Option<f64>,
    holdings: Option<PathBuf>,
    fractional: bool,
    output: Option<PathBuf>,
}

fn run_rebalance(config: &dyn ConfigPort, base_dir: &Path, args: RebalanceArgs) -> Result<(), RotatorError> {
    validate_rebalance_config(config)?;
    let assets = build_assets(config)?;

    let holdings: Vec<Holding> = match args.holdings.or_else(|| {
        config
            .get_string("rebalance", "holdings")
            .map(|p| resolve_path(base_dir, &p))
    }) {
        Some(path) => load_holdings(&path)?,
        None => Vec::new(),
    };
    let cash = match args.cash {
        Some(cash) => cash,
        None => optional_double(config, "rebalance", "cash")?.unwrap_or(0.0),
    };
    let policy = if args.fractional || config.get_bool("rebalance", "fractional", false) {
        UnitPolicy::Fractional
    } else {
        UnitPolicy::WholeUnits
    };

    let evaluation = evaluate_portfolio(config, base_dir, &assets, args.as_of)?;
    let as_of = evaluation.as_of;

    let mut prices: BTreeMap<String, f64> = evaluation
        .series
        .iter()
        .filter_map(|s| s.close_at_or_before(as_of).map(|c| (s.symbol().to_string(), c)))
        .collect();
    let port = price_adapter(config, base_dir);
    for holding in &holdings {
        if prices.contains_key(&holding.symbol) {
            continue;
        }
        match port.fetch_series(&holding.symbol, NaiveDate::MIN, as_of) {
            Ok(series) => {
                if let Some(close) = series.close_at_or_before(as_of) {
                    prices.insert(holding.symbol.clone(), close);
                }
            }
            Err(RotatorError::NoData { .. }) => {}
            Err(e) => return Err(e),
        }
    }

    let (_, weights) = compute_targets(config, &assets, evaluation)?;
    let plan = rebalance(&RebalanceInput {
        targets: &weights,
        holdings: &holdings,
        prices: &prices,
        cash,
        policy,
    })?;

    println!("=== Rebalance as of {} ===", as_of);
    println!("Portfolio value:  {:.2}", plan.total_value);
    print_weights(&weights);

    println!();
    if plan.orders.is_empty() {
        println!("No orders: holdings already match the targets.");
    } else {
        println!("{:<5} {:<8} {:>12} {:>10} {:>12}", "SIDE", "SYMBOL", "UNITS", "PRICE", "AMOUNT");
        for order in &plan.orders {
            println!(
                "{:<5} {:<8} {:>12.4} {:>10.2} {:>12.2}",
                order.action.to_string(),
                order.symbol,
                order.units,
                order.price,
                order.estimated_amount
            );
        }
    }
    for fill in &plan.partial_fills {
        println!(
            "note: {} partially filled ({:?}): wanted {:.2}, filled {:.2}",
            fill.symbol, fill.reason, fill.requested_value, fill.filled_value
        );
    }
    for missing in &plan.unknown_prices {
        println!("note: {}", missing);
    }
    println!("Uninvested cash:  {:.2}", plan.uninvested_cash);

    if let Some(path) = args.output {
        export::write_orders_csv(open_output(&path)?, &plan.orders)?;
        tracing::info!(path = %path.display(), orders = plan.orders.len(), "orders written");
    }
    Ok(())
}

fn print_metrics(label: &str, m: &Metrics) {
    println!("\n=== {} ===", label);
    println!("Final Value:      {:.2}", m.end_value);
    println!("Total Return:     {:.2}%", m.total_return * 100.0);
    println!("CAGR:             {:.2}%", m.cagr * 100.0);
    println!("Sharpe Ratio:     {:.2}", m.sharpe_ratio);
    println!("Sortino Ratio:    {:.2}", m.sortino_ratio);
    println!("Max Drawdown:     -{:.1}% ({} days)", m.max_drawdown * 100.0, m.max_drawdown_duration);
    println!("Winning Streak:   {} months", m.longest_winning_streak);
    println!("Losing Streak:    {} months", m.longest_losing_streak);
}

fn backtest_inputs(
    config: &dyn ConfigPort,
    base_dir: &Path,
) -> Result<(Vec<AssetConfig>, Vec<PriceSeries>, PriceSeries, BacktestConfig), RotatorError> {
    validate_backtest_config(config)?;
    let assets = build_assets(config)?;
    let bt_config = build_backtest_config(config)?;
    let benchmark = benchmark_symbol(config)?;
    let port = price_adapter(config, base_dir);
    let (series, benchmark_series) = load_universe(&port, &assets, &benchmark, bt_config.end_date)?;
    Ok((assets, series, benchmark_series, bt_config))
}

fn run_backtest_command(config: &dyn ConfigPort, base_dir: &Path, output: Option<&Path>) -> Result<(), RotatorError> {
    let (assets, series, benchmark, bt_config) = backtest_inputs(config, base_dir)?;

    tracing::info!(
        start = %bt_config.start_date,
        end = %bt_config.end_date,
        cadence = %bt_config.cadence,
        mode = %bt_config.mode,
        "running backtest"
    );
    let result = run_backtest(&assets, &series, &benchmark, &bt_config)?;

    print_metrics("Portfolio", &result.portfolio_metrics(bt_config.risk_free_rate));
    print_metrics(
        &format!("Benchmark ({})", benchmark.symbol()),
        &result.benchmark_metrics(bt_config.risk_free_rate),
    );

    println!("\n=== Rebalances ===");
    for record in &result.rebalances {
        let weights: Vec<String> = record
            .weights
            .iter()
            .map(|w| format!("{} {:.0}%", w.symbol, w.rounded_weight * 100.0))
            .collect();
        let gain = record
            .gain_since_previous
            .map(|g| format!("{:+.2}%", g * 100.0))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}  {:>12.2}  {:>8}  {}{}",
            record.date,
            record.portfolio_value,
            gain,
            weights.join(", "),
            if record.carried_forward { "  (carried forward)" } else { "" }
        );
    }

    if let Some(path) = output {
        export::write_backtest_csv(open_output(path)?, &result.points)?;
        tracing::info!(path = %path.display(), points = result.points.len(), "backtest curve written");
    }
    Ok(())
}

fn run_sweep_command(config: &dyn ConfigPort, base_dir: &Path, output: Option<&Path>) -> Result<(), RotatorError> {
    let grid = build_sweep_grid(config)?;
    let (assets, series, benchmark, bt_config) = backtest_inputs(config, base_dir)?;

    let outcomes = run_sweep(&assets, &series, &benchmark, &bt_config, &grid)?;

    match output {
        Some(path) => {
            export::write_sweep_csv(open_output(path)?, &outcomes)?;
            tracing::info!(path = %path.display(), cases = outcomes.len(), "sweep ranking written");
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            export::write_sweep_csv(&mut lock, &outcomes)?;
            lock.flush()?;
        }
    }
    Ok(())
}

/// Every asset and the benchmark need a price series the port knows about.
fn check_price_coverage(
    port: &dyn PricePort,
    assets: &[AssetConfig],
    benchmark: &str,
) -> Result<(), RotatorError> {
    let available = port.list_symbols()?;
    let missing = assets
        .iter()
        .map(|a| a.symbol.as_str())
        .chain(std::iter::once(benchmark))
        .find(|symbol| !available.iter().any(|s| s == symbol));
    match missing {
        Some(symbol) => Err(RotatorError::NoData {
            symbol: symbol.to_string(),
        }),
        None => Ok(()),
    }
}

fn run_validate(config: &dyn ConfigPort, base_dir: &Path) -> Result<(), RotatorError> {
    validate_portfolio_config(config)?;
    let assets = build_assets(config)?;
    build_signal_config(config)?;
    build_allocation_config(config)?;

    let sections = config.sections();
    if sections.iter().any(|s| s == "backtest") {
        validate_backtest_config(config)?;
        build_backtest_config(config)?;
    }
    if sections.iter().any(|s| s == "rebalance") {
        validate_rebalance_config(config)?;
    }
    if sections.iter().any(|s| s == "sweep") {
        build_sweep_grid(config)?;
    }
    check_price_coverage(&price_adapter(config, base_dir), &assets, &benchmark_symbol(config)?)?;

    println!("Assets:");
    for asset in &assets {
        println!(
            "  {:<8} base {:>5.1}%  trend ±{:.1}%  relative ±{:.1}%",
            asset.symbol,
            asset.base_weight * 100.0,
            asset.trend_adjustment * 100.0,
            asset.relative_adjustment * 100.0
        );
    }
    println!("Configuration is valid.");
    Ok(())
}
