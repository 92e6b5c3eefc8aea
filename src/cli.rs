//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::{CsvAdapter, read_membership};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{BacktestResult, run_backtest_from};
use crate::domain::config::{ExecutionTiming, SimulationConfig};
use crate::domain::error::RsitraderError;
use crate::domain::execution::CostModel;
use crate::domain::metrics::{CodeResult, PerformanceSummary};
use crate::domain::universe::{UniverseMembership, parse_codes, validate_universe};
use crate::ports::config_port::{ConfigPort, require_parsed};
use crate::ports::data_port::DataPort;

#[derive(Parser, Debug)]
#[command(name = "rsitrader", about = "RSI mean-reversion portfolio backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Overrides [data] dir
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
        /// Close open positions at the last mark when the run ends
        #[arg(long)]
        liquidate: bool,
    },
    /// Validate a configuration file without running
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List codes with bar files in the data directory
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let outcome = match cli.command {
        Command::Backtest {
            config,
            data_dir,
            liquidate,
        } => run_backtest_command(&config, data_dir, liquidate),
        Command::Validate { config } => run_validate(&config),
        Command::ListSymbols { config, data_dir } => run_list_symbols(&config, data_dir),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        }
    }
}

/// Everything the shell needs besides the simulation parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub risk_free_rate: f64,
    pub data_dir: PathBuf,
    pub membership_file: Option<PathBuf>,
}

/// Summary, per-code breakdown and raw result of one pipeline run.
#[derive(Debug, Clone)]
pub struct BacktestReport {
    pub result: BacktestResult,
    pub summary: PerformanceSummary,
    pub code_results: Vec<CodeResult>,
}

fn run_backtest_command(
    config_path: &Path,
    data_dir: Option<PathBuf>,
    liquidate: bool,
) -> Result<(), RsitraderError> {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = FileConfigAdapter::from_file(config_path)?;

    let mut config = build_simulation_config(&adapter)?;
    if liquidate {
        config.liquidate_at_end = true;
    }
    let settings = build_run_settings(&adapter, data_dir)?;

    let membership = settings
        .membership_file
        .as_deref()
        .map(read_membership)
        .transpose()?;
    let data_port = CsvAdapter::new(settings.data_dir.clone());
    let codes = resolve_codes(&adapter, membership.as_ref(), &data_port)?;

    let report = run_backtest_pipeline(&data_port, membership.as_ref(), &config, &settings, codes)?;
    print_report(&report);
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), RsitraderError> {
    eprintln!("Validating config {}", config_path.display());
    let adapter = FileConfigAdapter::from_file(config_path)?;

    let config = build_simulation_config(&adapter)?;
    config.validate()?;
    let settings = build_run_settings(&adapter, None)?;

    eprintln!("\nStrategy:");
    eprintln!(
        "  oscillator:   RSI({}, {}) buy <= {}, sell >= {}",
        config.oscillator_window,
        config.oscillator_smoothing,
        config.buy_threshold,
        config.sell_threshold
    );
    eprintln!("  trend filter: {}({})", config.trend_filter, config.trend_window);
    eprintln!(
        "  positions:    max {}, allocation {}, hold <= {} days, cooldown {} days",
        config.max_positions, config.allocation, config.max_holding_days, config.cooldown_days
    );
    eprintln!("  execution:    {}", config.execution);

    eprintln!("\nRange: {} to {}", settings.start_date, settings.end_date);
    match adapter.get_string("backtest", "codes") {
        Some(raw) if !raw.trim().is_empty() => {
            let codes = parse_codes(&raw)?;
            eprintln!("Codes: {}", codes.join(", "));
        }
        _ => eprintln!("Codes: resolved from membership file or data directory"),
    }

    eprintln!("\nConfiguration is valid");
    Ok(())
}

fn run_list_symbols(config_path: &Path, data_dir: Option<PathBuf>) -> Result<(), RsitraderError> {
    let adapter = FileConfigAdapter::from_file(config_path)?;
    let settings = build_run_settings(&adapter, data_dir)?;
    let symbols = CsvAdapter::new(settings.data_dir.clone()).list_symbols()?;

    if symbols.is_empty() {
        eprintln!("No symbols found in {}", settings.data_dir.display());
    } else {
        for symbol in &symbols {
            println!("{}", symbol);
        }
        eprintln!("{} symbols found", symbols.len());
    }
    Ok(())
}

/// Map `[strategy]`, `[costs]` and `[backtest]` into a [`SimulationConfig`].
///
/// Every key is required except `liquidate_at_end`, which defaults to false.
/// Semantic checks are left to [`SimulationConfig::validate`].
pub fn build_simulation_config(adapter: &dyn ConfigPort) -> Result<SimulationConfig, RsitraderError> {
    let liquidate_at_end = adapter.get_bool("backtest", "liquidate_at_end", false)?;

    Ok(SimulationConfig {
        initial_capital: require_parsed(adapter, "backtest", "initial_capital")?,
        oscillator_window: require_parsed(adapter, "strategy", "oscillator_window")?,
        oscillator_smoothing: require_parsed(adapter, "strategy", "oscillator_smoothing")?,
        trend_window: require_parsed(adapter, "strategy", "trend_window")?,
        trend_filter: require_parsed(adapter, "strategy", "trend_filter")?,
        buy_threshold: require_parsed(adapter, "strategy", "buy_threshold")?,
        sell_threshold: require_parsed(adapter, "strategy", "sell_threshold")?,
        max_positions: require_parsed(adapter, "strategy", "max_positions")?,
        max_holding_days: require_parsed(adapter, "strategy", "max_holding_days")?,
        cooldown_days: require_parsed(adapter, "strategy", "cooldown_days")?,
        allocation: require_parsed(adapter, "strategy", "allocation")?,
        costs: CostModel {
            commission_rate: require_parsed(adapter, "costs", "commission_rate")?,
            tax_rate: require_parsed(adapter, "costs", "tax_rate")?,
            slippage_rate: require_parsed(adapter, "costs", "slippage_rate")?,
        },
        min_trade_notional: require_parsed(adapter, "costs", "min_trade_notional")?,
        execution: require_parsed::<ExecutionTiming>(adapter, "strategy", "execution")?,
        liquidate_at_end,
    })
}

/// Dates, risk-free rate and data locations. `data_dir` overrides `[data] dir`.
pub fn build_run_settings(
    adapter: &dyn ConfigPort,
    data_dir: Option<PathBuf>,
) -> Result<RunSettings, RsitraderError> {
    let start_date = parse_date(adapter, "start_date")?;
    let end_date = parse_date(adapter, "end_date")?;
    if start_date >= end_date {
        return Err(RsitraderError::invalid(
            "backtest",
            "start_date",
            "start_date must be before end_date",
        ));
    }

    let risk_free_rate = adapter.get_double("backtest", "risk_free_rate", 0.0);
    if !(0.0..1.0).contains(&risk_free_rate) {
        return Err(RsitraderError::invalid(
            "backtest",
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }

    let data_dir = match data_dir {
        Some(dir) => dir,
        None => PathBuf::from(adapter.require_string("data", "dir")?),
    };
    let membership_file = adapter
        .get_string("data", "membership_file")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from);

    Ok(RunSettings {
        start_date,
        end_date,
        risk_free_rate,
        data_dir,
        membership_file,
    })
}

fn parse_date(adapter: &dyn ConfigPort, key: &str) -> Result<NaiveDate, RsitraderError> {
    let raw = adapter.require_string("backtest", key)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|_| {
        RsitraderError::invalid(
            "backtest",
            key,
            format!("invalid date '{}' (expected YYYY-MM-DD)", raw),
        )
    })
}

/// Codes to load: `[backtest] codes` if set, otherwise every member of the
/// membership table, otherwise every bar file the data port knows.
pub fn resolve_codes(
    adapter: &dyn ConfigPort,
    membership: Option<&UniverseMembership>,
    data_port: &dyn DataPort,
) -> Result<Vec<String>, RsitraderError> {
    if let Some(raw) = adapter.get_string("backtest", "codes") {
        if !raw.trim().is_empty() {
            return Ok(parse_codes(&raw)?);
        }
    }

    if let Some(membership) = membership {
        return Ok(membership.all_codes().into_iter().collect());
    }

    let symbols = data_port.list_symbols()?;
    if symbols.is_empty() {
        return Err(RsitraderError::missing("backtest", "codes"));
    }
    Ok(symbols)
}

/// Load and validate the universe, run the simulation and summarize it.
pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    membership: Option<&UniverseMembership>,
    config: &SimulationConfig,
    settings: &RunSettings,
    codes: Vec<String>,
) -> Result<BacktestReport, RsitraderError> {
    config.validate()?;

    let min_bars = config.indicator_params().warmup_bars();
    eprintln!("Validating {} codes...", codes.len());
    let validation = validate_universe(
        data_port,
        codes,
        settings.start_date,
        settings.end_date,
        min_bars,
    )?;

    eprintln!(
        "Running backtest: {} codes, {} to {}",
        validation.series.len(),
        settings.start_date,
        settings.end_date,
    );

    let result = run_backtest_from(
        &validation.series,
        membership,
        config,
        settings.start_date,
    )?;
    eprintln!("  Processed: {} dates", result.equity_curve().len());

    let summary = PerformanceSummary::compute(
        result.equity_curve(),
        result.trades(),
        config.initial_capital,
        settings.risk_free_rate,
    );
    let code_results = CodeResult::compute_per_code(result.trades());

    Ok(BacktestReport {
        result,
        summary,
        code_results,
    })
}

fn print_report(report: &BacktestReport) {
    let s = &report.summary;
    eprintln!("\n=== Aggregate Results ===");
    eprintln!("Initial Capital:  {:.2}", s.initial_capital);
    eprintln!("Final Equity:     {:.2}", s.final_equity);
    eprintln!("Total Return:     {:.2}%", s.total_return);
    eprintln!("Annualized:       {:.2}%", s.annualized_return);
    eprintln!("Sharpe Ratio:     {:.2}", s.sharpe_ratio);
    eprintln!("Sortino Ratio:    {:.2}", s.sortino_ratio);
    eprintln!(
        "Max Drawdown:     {:.2}% ({} days)",
        s.max_drawdown, s.max_drawdown_duration
    );
    eprintln!(
        "Total Trades:     {} ({} won, {} lost, {} even)",
        s.total_trades, s.trades_won, s.trades_lost, s.trades_breakeven
    );
    eprintln!("Win Rate:         {:.1}%", s.win_rate);
    eprintln!("Profit Factor:    {:.2}", s.profit_factor);
    eprintln!("Avg Holding:      {:.1} days", s.avg_holding_days);
    eprintln!(
        "Exits:            {} signal, {} max holding, {} liquidation",
        s.signal_exits, s.max_holding_exits, s.liquidation_exits
    );

    let open = report.result.portfolio.position_count();
    if open > 0 {
        eprintln!("Open Positions:   {}", open);
    }

    if !report.code_results.is_empty() {
        eprintln!("\n=== Per-Code Summary ===");
        for cr in &report.code_results {
            let pnl_sign = if cr.total_pnl >= 0.0 { "+" } else { "" };
            eprintln!(
                "  {}:  {} trades, {:.1}% win rate, {}{:.0}",
                cr.code, cr.total_trades, cr.win_rate, pnl_sign, cr.total_pnl,
            );
        }
    }

    let open = &report.result.portfolio.positions;
    if !open.is_empty() {
        eprintln!("\n=== Open Positions ===");
        for position in open.values() {
            eprintln!(
                "  {}:  {} @ {:.2} since {}, mark {:.2}, unrealized {:+.0}",
                position.code,
                position.quantity,
                position.entry_price,
                position.entry_date,
                position.mark_price,
                position.unrealized_pnl(),
            );
        }
    }
}
