//! CLI definition and dispatch.

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use crate::adapters::csv_adapter::CsvDataSource;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::log_sink::LogSink;
use crate::domain::backtest::{BacktestEngine, BacktestRequest, BacktestResult, DEFAULT_INTERVAL};
use crate::domain::config_validation::EngineSettings;
use crate::domain::error::StratsimError;
use crate::domain::metrics::Metrics;
use crate::domain::strategy::{ParamValue, RawParams, StrategyRegistry};
use crate::ports::sink_port::SimulationSink;
use crate::simulation::clock::default_replay_start;
use crate::simulation::{SessionSnapshot, SimulationManager, SimulationMode, SimulationRequest};

#[derive(Parser, Debug)]
#[command(name = "stratsim", about = "Trading strategy backtester and paced simulator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a one-shot backtest over CSV data
    Backtest(RunArgs),
    /// Replay CSV data through a paced simulation session
    Simulate {
        #[command(flatten)]
        run: RunArgs,
        /// Replay speed multiplier, clamped to [0.1, 100]
        #[arg(long)]
        speed: Option<f64>,
    },
    /// List registered strategies and their parameters
    Strategies {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// INI configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Directory of <SYMBOL>.csv files, overrides [data] csv_dir
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
    #[arg(short, long)]
    pub strategy: String,
    /// Traded symbol; repeat for the second leg of a pair
    #[arg(long = "symbol", required = true)]
    pub symbols: Vec<String>,
    /// YYYY-MM-DD or RFC 3339
    #[arg(long, value_parser = parse_datetime)]
    pub start: Option<DateTime<Utc>>,
    #[arg(long, value_parser = parse_datetime)]
    pub end: Option<DateTime<Utc>>,
    #[arg(long, default_value = DEFAULT_INTERVAL)]
    pub interval: String,
    /// Strategy parameter as name=value; repeatable
    #[arg(short, long = "param", value_parser = parse_param)]
    pub params: Vec<(String, ParamValue)>,
    #[arg(long)]
    pub json: bool,
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest(args) => run_backtest(&args),
        Command::Simulate { run, speed } => run_simulate(&run, speed),
        Command::Strategies { json } => run_strategies(json),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn parse_datetime(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| format!("invalid date '{raw}' (expected YYYY-MM-DD or RFC 3339)"))
}

/// `name=value`, typed as an integer, then a float, then text.
pub fn parse_param(raw: &str) -> Result<(String, ParamValue), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("invalid parameter '{raw}' (expected name=value)"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("invalid parameter '{raw}' (empty name)"));
    }
    let value = value.trim();
    let value = if let Ok(i) = value.parse::<i64>() {
        ParamValue::Int(i)
    } else if let Ok(f) = value.parse::<f64>() {
        ParamValue::Float(f)
    } else {
        ParamValue::Text(value.to_string())
    };
    Ok((name.to_string(), value))
}

fn load_settings(config_path: Option<&PathBuf>) -> Result<EngineSettings, StratsimError> {
    match config_path {
        Some(path) => {
            eprintln!("Loading config from {}", path.display());
            let adapter = FileConfigAdapter::from_file(path)?;
            EngineSettings::from_config(&adapter)
        }
        None => Ok(EngineSettings::default()),
    }
}

fn resolve_data_dir(args: &RunArgs, settings: &EngineSettings) -> Result<PathBuf, StratsimError> {
    args.data_dir
        .clone()
        .or_else(|| settings.csv_dir.as_ref().map(PathBuf::from))
        .ok_or_else(|| StratsimError::ConfigMissing {
            section: "data".into(),
            key: "csv_dir".into(),
        })
}

fn raw_params(args: &RunArgs) -> RawParams {
    args.params.iter().cloned().collect()
}

fn normalize_symbols(symbols: &[String]) -> Vec<String> {
    symbols
        .iter()
        .flat_map(|s| s.split(','))
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn run_backtest(args: &RunArgs) -> Result<(), StratsimError> {
    let settings = load_settings(args.config.as_ref())?;
    let data = CsvDataSource::new(resolve_data_dir(args, &settings)?);
    let strategies = StrategyRegistry::with_builtin();

    let symbols = normalize_symbols(&args.symbols);
    let request = BacktestRequest {
        symbols,
        strategy_name: args.strategy.clone(),
        params: raw_params(args),
        start: args.start.unwrap_or_else(default_replay_start),
        end: args.end.unwrap_or_else(Utc::now),
        interval: args.interval.clone(),
        initial_cash: settings.initial_cash,
        fee_pct: settings.execution.fee_pct,
        slippage_bps: settings.execution.slippage_bps,
        position_size_pct: settings.position_size_pct,
    };

    eprintln!(
        "Running backtest: {} on {}, {} to {}",
        request.strategy_name,
        request.symbols.join("/"),
        request.start.date_naive(),
        request.end.date_naive()
    );
    let result = BacktestEngine::new(&data, &strategies).run(&request)?;

    if args.json {
        print_json(&result)?;
    } else {
        print_backtest_summary(&result, request.initial_cash);
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), StratsimError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| StratsimError::Io(e.into()))?;
    println!("{json}");
    Ok(())
}

fn print_metrics(metrics: &Metrics) {
    println!("Total P&L:        {:.2}", metrics.total_pnl);
    println!("Return:           {:.2}%", metrics.return_pct);
    println!("Sharpe Ratio:     {:.2}", metrics.sharpe_ratio);
    println!("Max Drawdown:     {:.2}%", metrics.max_drawdown_pct);
    println!("Total Trades:     {}", metrics.total_trades);
    println!("Win Rate:         {:.1}%", metrics.win_rate * 100.0);
    println!("Profit Factor:    {:.2}", metrics.profit_factor);
    println!("Avg Duration:     {:.1} days", metrics.avg_trade_duration_days);
    println!("Total Fees:       {:.2}", metrics.total_fees);
}

fn print_backtest_summary(result: &BacktestResult, initial_cash: f64) {
    println!("\n=== Backtest {} ===", result.id);
    if result.equity_curve.is_empty() {
        println!("No historical data in the requested window.");
        return;
    }
    println!("Bars:             {}", result.equity_curve.len());
    println!("Initial Cash:     {initial_cash:.2}");
    print_metrics(&result.metrics);
    println!("Fills:            {}", result.fills.len());
    println!("Duration:         {} ms", result.duration_ms);
}

fn build_sink(settings: &EngineSettings) -> Result<Arc<dyn SimulationSink>, StratsimError> {
    #[cfg(feature = "sqlite")]
    {
        if let Some(path) = &settings.sqlite_path {
            eprintln!("Persisting session to {path}");
            let sink = crate::adapters::sqlite_adapter::SqliteSink::open(path, 1)?;
            return Ok(Arc::new(sink));
        }
    }

    #[cfg(not(feature = "sqlite"))]
    {
        if settings.sqlite_path.is_some() {
            tracing::warn!("[sqlite] path is set but the sqlite feature is disabled, logging only");
        }
    }

    Ok(Arc::new(LogSink))
}

fn run_simulate(args: &RunArgs, speed: Option<f64>) -> Result<(), StratsimError> {
    let settings = load_settings(args.config.as_ref())?;
    let data = Arc::new(CsvDataSource::new(resolve_data_dir(args, &settings)?));
    let sink = build_sink(&settings)?;

    let request = SimulationRequest {
        strategy_name: args.strategy.clone(),
        params: raw_params(args),
        symbols: normalize_symbols(&args.symbols),
        mode: SimulationMode::Replay,
        speed,
        interval: args.interval.clone(),
        start: args.start,
        end: args.end,
        initial_cash: settings.initial_cash,
        fee_pct: settings.execution.fee_pct,
        slippage_bps: settings.execution.slippage_bps,
        position_size_pct: settings.position_size_pct,
    };

    let manager = SimulationManager::new(
        data,
        Arc::new(StrategyRegistry::with_builtin()),
        sink,
        settings.simulation.clone(),
    );

    let runtime = tokio::runtime::Runtime::new()?;
    let _guard = runtime.enter();
    let id = manager.create_session(&request)?;
    eprintln!("Simulation {id} started (Ctrl-C to stop)");
    let snapshot = runtime.block_on(async {
        tokio::select! {
            finished = manager.wait_finished(&id) => finished,
            _ = tokio::signal::ctrl_c() => {
                eprintln!("Stopping simulation {id}...");
                manager.stop(&id).await
            }
        }
    })?;

    if args.json {
        print_json(&snapshot)?;
    } else {
        print_session_summary(&snapshot);
    }
    match &snapshot.error {
        Some(reason) => Err(StratsimError::DataSource {
            reason: format!("simulation {} ended in error: {reason}", snapshot.session_id),
        }),
        None => Ok(()),
    }
}

fn print_session_summary(snapshot: &SessionSnapshot) {
    println!("\n=== Simulation {} ===", snapshot.session_id);
    println!("Status:           {}", snapshot.status);
    println!("Ticks:            {}", snapshot.tick_count);
    println!("Equity:           {:.2}", snapshot.equity);
    println!("Cash:             {:.2}", snapshot.cash);
    println!("Trades:           {}", snapshot.total_trades);
    for pos in &snapshot.positions {
        println!(
            "  {}: {} @ {:.2} (unrealized {:+.2})",
            pos.symbol, pos.quantity, pos.avg_cost, pos.unrealized_pnl
        );
    }
}

fn format_value(value: &ParamValue) -> String {
    match value {
        ParamValue::Int(i) => i.to_string(),
        ParamValue::Float(f) => f.to_string(),
        ParamValue::Text(s) => s.clone(),
    }
}

fn run_strategies(json: bool) -> Result<(), StratsimError> {
    let strategies = StrategyRegistry::with_builtin().describe_all();
    if json {
        return print_json(&strategies);
    }

    for info in &strategies {
        let pair = if info.requires_pair { " [pair]" } else { "" };
        println!("{} - {}{}", info.name, info.display_name, pair);
        println!("    {}", info.description);
        for param in &info.parameters {
            let bounds = match (param.min, param.max) {
                (Some(min), Some(max)) => format!(" [{min}, {max}]"),
                _ if !param.options.is_empty() => format!(" {{{}}}", param.options.join(", ")),
                _ => String::new(),
            };
            println!(
                "    {:<16} {} (default {}){}",
                param.name,
                param.label,
                format_value(&param.default),
                bounds
            );
        }
    }
    Ok(())
}
