//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use crate::adapters::confluence_oracle::ConfluenceOracle;
use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report::JsonReportAdapter;
use crate::domain::backtest::{self as engine, BacktestConfig, BacktestResult, SimulationParams};
use crate::domain::buffer::BufferCapacity;
use crate::domain::config_validation::{
    parse_date, validate_backtest_config, validate_simulation_config, DEFAULT_MIN_CONFIDENCE,
    DEFAULT_RISK_PER_TRADE, DEFAULT_TIMEFRAME,
};
use crate::domain::error::SynthError;
use crate::domain::gate::GateThresholds;
use crate::domain::history::{HistoryLoader, RetryConfig};
use crate::domain::position::ExitParams;
use crate::domain::symbol::SymbolConfiguration;
use crate::domain::timeframe::Timeframe;
use crate::domain::validation::{StrategyValidator, ValidationOutcome};
use crate::ports::config_port::ConfigPort;
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::oracle_port::PredictionOracle;
use crate::ports::report_port::ReportPort;

const DEFAULT_DATA_PATH: &str = "data";

#[derive(Parser, Debug)]
#[command(name = "synthtrader", about = "Synthetic index strategy backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest over historical data
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Run the 90-day strategy validation gate
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the configuration used for a symbol
    Info {
        #[arg(long)]
        symbol: String,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            output,
            symbol,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config, symbol.as_deref())
            } else {
                run_backtest(&config, output.as_ref(), symbol.as_deref())
            }
        }
        Command::Validate { config } => run_validate(&config),
        Command::Info { symbol } => run_info(&symbol),
    }
}

fn fail(err: SynthError) -> ExitCode {
    eprintln!("error: {err}");
    ExitCode::from(&err)
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(fail)
}

/// Where replay ticks come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// Historical candles through the fallback loader, replayed as served.
    Candles,
    /// The symbol's recorded tick stream, clipped to the backtest window.
    Ticks,
}

/// Everything a run needs, read and validated from one config file.
#[derive(Debug)]
pub struct RunSetup {
    pub backtest: BacktestConfig,
    pub simulation: SimulationParams,
    pub retry: RetryConfig,
    pub data_path: PathBuf,
    pub source: DataSource,
}

pub fn prepare(config: &dyn ConfigPort, symbol_override: Option<&str>) -> Result<RunSetup, SynthError> {
    if symbol_override.is_none() {
        validate_backtest_config(config)?;
    }
    validate_simulation_config(config)?;

    Ok(RunSetup {
        backtest: build_backtest_config(config, symbol_override)?,
        simulation: build_simulation_params(config)?,
        retry: build_retry_config(config)?,
        source: build_data_source(config)?,
        data_path: PathBuf::from(
            config
                .get_string("data", "path")
                .unwrap_or_else(|| DEFAULT_DATA_PATH.to_string()),
        ),
    })
}

pub fn build_backtest_config(
    config: &dyn ConfigPort,
    symbol_override: Option<&str>,
) -> Result<BacktestConfig, SynthError> {
    let symbol = match symbol_override {
        Some(s) => s.trim().to_string(),
        None => config
            .get_string("backtest", "symbol")
            .map(|s| s.trim().to_string())
            .ok_or_else(|| SynthError::missing("backtest", "symbol"))?,
    };
    let timeframe: Timeframe = config
        .get_string("backtest", "timeframe")
        .unwrap_or_else(|| DEFAULT_TIMEFRAME.to_string())
        .parse()?;
    let start_date = parse_date(config.get_string("backtest", "start_date").as_deref(), "start_date")?;
    let end_date = parse_date(config.get_string("backtest", "end_date").as_deref(), "end_date")?;

    let bt = BacktestConfig {
        symbol,
        timeframe,
        start_date,
        end_date,
        initial_balance: config.get_double("backtest", "initial_balance", 0.0),
        risk_per_trade: config.get_double("backtest", "risk_per_trade", DEFAULT_RISK_PER_TRADE),
        min_confidence_threshold: config.get_double(
            "backtest",
            "min_confidence_threshold",
            DEFAULT_MIN_CONFIDENCE,
        ),
    };
    bt.validate()?;
    Ok(bt)
}

fn count(config: &dyn ConfigPort, section: &str, key: &str, default: i64) -> Result<usize, SynthError> {
    let value = config.get_int(section, key, default);
    usize::try_from(value)
        .ok()
        .filter(|&v| v > 0)
        .ok_or_else(|| SynthError::invalid(section, key, format!("{key} must be at least 1")))
}

pub fn build_simulation_params(config: &dyn ConfigPort) -> Result<SimulationParams, SynthError> {
    let defaults = SimulationParams::default();
    let exits = ExitParams {
        stop_loss_pct: config.get_double("exits", "stop_loss_pct", defaults.exits.stop_loss_pct),
        take_profit_pct: config.get_double("exits", "take_profit_pct", defaults.exits.take_profit_pct),
        multiplier_base: config.get_double(
            "exits",
            "confidence_multiplier_base",
            defaults.exits.multiplier_base,
        ),
    };
    let signal_interval = match config.get_string("simulation", "signal_interval") {
        Some(_) => Some(count(config, "simulation", "signal_interval", 0)? as u64),
        None => None,
    };
    let quality_gate = config
        .get_bool("simulation", "quality_gate", false)
        .then(GateThresholds::default);

    let params = SimulationParams {
        candle_window: count(config, "simulation", "candle_window", defaults.candle_window as i64)?,
        confidence_floor: config.get_double("exits", "confidence_floor", defaults.confidence_floor),
        exits,
        capacity: BufferCapacity {
            ticks: count(config, "simulation", "tick_capacity", defaults.capacity.ticks as i64)?,
            candles: count(config, "simulation", "candle_capacity", defaults.capacity.candles as i64)?,
        },
        signal_interval,
        quality_gate,
        ..defaults
    };
    params.validate()?;
    Ok(params)
}

pub fn build_retry_config(config: &dyn ConfigPort) -> Result<RetryConfig, SynthError> {
    let defaults = RetryConfig::default();
    let max_retries = u32::try_from(config.get_int("data", "max_retries", defaults.max_retries as i64))
        .map_err(|_| SynthError::invalid("data", "max_retries", "max_retries must be non-negative"))?;
    let pace_ms = u64::try_from(config.get_int("data", "pace_ms", defaults.pace.as_millis() as i64))
        .map_err(|_| SynthError::invalid("data", "pace_ms", "pace_ms must be non-negative"))?;
    Ok(RetryConfig {
        max_retries,
        pace: Duration::from_millis(pace_ms),
    })
}

pub fn build_data_source(config: &dyn ConfigPort) -> Result<DataSource, SynthError> {
    match config.get_string("data", "source").as_deref().map(str::trim) {
        None | Some("candles") => Ok(DataSource::Candles),
        Some("ticks") => Ok(DataSource::Ticks),
        Some(other) => Err(SynthError::invalid(
            "data",
            "source",
            format!("unknown source '{other}', expected candles or ticks"),
        )),
    }
}

/// Loads history or recorded ticks for `bt` from `data` and runs the simulator.
pub fn run_pipeline(
    data: &dyn MarketDataPort,
    oracle: &dyn PredictionOracle,
    bt: &BacktestConfig,
    params: &SimulationParams,
    retry: RetryConfig,
    source: DataSource,
) -> Result<BacktestResult, SynthError> {
    match source {
        DataSource::Candles => {
            let mut loader = HistoryLoader::new(data, retry);
            let history = loader.load(&bt.symbol, bt.timeframe, bt.start_epoch(), bt.end_epoch())?;
            eprintln!(
                "Loaded {} records for {} at {}s granularity",
                history.candles.len(),
                history.symbol,
                history.granularity
            );
            engine::run_backtest_on_candles(bt, &history.candles, oracle, params)
        }
        DataSource::Ticks => {
            let (start, end) = (bt.start_epoch(), bt.end_epoch());
            let ticks: Vec<_> = data
                .subscribe(&bt.symbol)?
                .filter(|t| t.epoch >= start && t.epoch <= end)
                .collect();
            eprintln!("Replaying {} recorded ticks for {}", ticks.len(), bt.symbol);
            engine::run_backtest(bt, &ticks, oracle, params)
        }
    }
}

fn run_backtest(config_path: &Path, output_path: Option<&PathBuf>, symbol: Option<&str>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let setup = match prepare(&adapter, symbol) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    let bt = &setup.backtest;
    eprintln!(
        "Running backtest: {} {} from {} to {}",
        bt.symbol, bt.timeframe, bt.start_date, bt.end_date
    );

    let mut data = CsvAdapter::new(setup.data_path.clone());
    if let Err(e) = data.connect() {
        return fail(e);
    }
    let outcome = run_pipeline(
        &data,
        &ConfluenceOracle::new(),
        bt,
        &setup.simulation,
        setup.retry.clone(),
        setup.source,
    );
    if let Err(e) = data.disconnect() {
        return fail(e);
    }
    let result = match outcome {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    print_summary(&result);

    let output = output_path
        .cloned()
        .or_else(|| adapter.get_string("report", "output").map(PathBuf::from));
    if let Some(output) = output {
        if let Err(e) = JsonReportAdapter::new().write(&result, &output.to_string_lossy()) {
            return fail(e);
        }
        eprintln!("\nReport written to: {}", output.display());
    }
    ExitCode::SUCCESS
}

pub fn print_summary(result: &BacktestResult) {
    let m = &result.performance_metrics;
    eprintln!("\n=== Backtest Results ===");
    eprintln!("Total Trades:     {}", result.total_trades);
    eprintln!(
        "Win Rate:         {:.1}% ({} won, {} lost)",
        result.win_rate, result.winning_trades, result.losing_trades
    );
    eprintln!("Total PnL:        {:.2}", result.total_pnl);
    eprintln!("Final Balance:    {:.2}", result.final_balance);
    eprintln!(
        "Max Drawdown:     {:.2} ({:.1}%)",
        result.max_drawdown, m.max_drawdown_pct
    );
    eprintln!("Sharpe Ratio:     {:.2}", result.sharpe_ratio);
    eprintln!("Profit Factor:    {:.2}", result.profit_factor);
    eprintln!("Avg Duration:     {:.1} min", result.avg_trade_duration_minutes);
    eprintln!("Accuracy:         {:.1}%", m.accuracy * 100.0);
    eprintln!(
        "Signals:          {} evaluated, {} oracle failures",
        result.signals_evaluated, result.oracle_failures
    );
    if !result.gate_rejections.is_empty() {
        eprintln!("\n=== Gate Rejections ===");
        for (gate, n) in &result.gate_rejections {
            eprintln!("  {gate}: {n}");
        }
    }
}

fn run_dry_run(config_path: &Path, symbol: Option<&str>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let setup = match prepare(&adapter, symbol) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    eprintln!("Config validated successfully");

    let bt = &setup.backtest;
    let sim = &setup.simulation;
    eprintln!("\nBacktest:");
    eprintln!("  symbol:         {}", bt.symbol);
    eprintln!("  timeframe:      {}", bt.timeframe);
    eprintln!("  period:         {} to {}", bt.start_date, bt.end_date);
    eprintln!("  balance:        {:.2}", bt.initial_balance);
    eprintln!("  risk/trade:     {}", bt.risk_per_trade);
    eprintln!("  min confidence: {}", bt.min_confidence_threshold);
    eprintln!("\nSimulation:");
    eprintln!("  candle window:  {}", sim.candle_window);
    eprintln!(
        "  signal every:   {} ticks",
        sim.signal_interval
            .unwrap_or_else(|| bt.timeframe.signal_tick_interval())
    );
    eprintln!(
        "  exits:          stop {} / target {} (base {})",
        sim.exits.stop_loss_pct, sim.exits.take_profit_pct, sim.exits.multiplier_base
    );
    eprintln!("  quality gate:   {}", sim.quality_gate.is_some());
    eprintln!("  data path:      {}", setup.data_path.display());
    eprintln!("  data source:    {:?}", setup.source);

    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let setup = match prepare(&adapter, None) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    let mut data = CsvAdapter::new(setup.data_path.clone());
    if let Err(e) = data.connect() {
        return fail(e);
    }
    let oracle = ConfluenceOracle::new();
    let now = chrono::Utc::now().timestamp();
    let mut validator = StrategyValidator::default();

    let outcome = validator.validate(&setup.backtest, now, |window| {
        eprintln!(
            "Validating {} {} over {} to {}",
            window.symbol, window.timeframe, window.start_date, window.end_date
        );
        let result = run_pipeline(
            &data,
            &oracle,
            window,
            &setup.simulation,
            setup.retry.clone(),
            setup.source,
        )?;
        print_summary(&result);
        Ok(result)
    });

    match outcome {
        Ok(ValidationOutcome::Passed { .. }) => {
            println!("{} {}: validated", setup.backtest.symbol, setup.backtest.timeframe);
            ExitCode::SUCCESS
        }
        Ok(ValidationOutcome::Failed { criterion, detail }) => {
            println!(
                "{} {}: not validated ({criterion}: {detail})",
                setup.backtest.symbol, setup.backtest.timeframe
            );
            ExitCode::FAILURE
        }
        Err(e) => fail(e),
    }
}

fn run_info(symbol: &str) -> ExitCode {
    let config = SymbolConfiguration::for_symbol(symbol);
    println!("{symbol}: {:?}", config.class);
    println!("  pip size:        {}", config.pip_size);
    println!("  volatility mult: {}", config.volatility_multiplier);
    println!("  rsi period:      {}", config.rsi_period);
    println!(
        "  macd:            {}/{}/{}",
        config.macd_fast, config.macd_slow, config.macd_signal
    );
    println!("  atr period:      {}", config.atr_period);
    println!(
        "  bollinger:       {} x {}",
        config.bollinger_period, config.bollinger_mult
    );
    println!("  stochastic:      {}", config.stochastic_period);
    match config.spike {
        Some(spike) => println!(
            "  spikes:          threshold {}, expected every {} ticks",
            spike.threshold, spike.expected_ticks
        ),
        None => println!("  spikes:          none"),
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = r#"
[backtest]
symbol = CRASH500
timeframe = 15m
start_date = 2024-02-01
end_date = 2024-02-29
initial_balance = 500

[exits]
stop_loss_pct = 0.02
confidence_floor = 0.55

[simulation]
candle_window = 30
signal_interval = 10
quality_gate = true

[data]
path = /srv/data
max_retries = 1
pace_ms = 0
"#;

    fn config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn prepare_reads_every_section() {
        let setup = prepare(&config(BASE), None).unwrap();
        assert_eq!(setup.backtest.symbol, "CRASH500");
        assert_eq!(setup.backtest.timeframe, Timeframe::M15);
        assert_eq!(setup.backtest.risk_per_trade, DEFAULT_RISK_PER_TRADE);
        assert_eq!(setup.simulation.candle_window, 30);
        assert_eq!(setup.simulation.signal_interval, Some(10));
        assert_eq!(setup.simulation.exits.stop_loss_pct, 0.02);
        assert_eq!(setup.simulation.exits.take_profit_pct, 0.02);
        assert_eq!(setup.simulation.confidence_floor, 0.55);
        assert!(setup.simulation.quality_gate.is_some());
        assert_eq!(setup.retry.max_retries, 1);
        assert!(setup.retry.pace.is_zero());
        assert_eq!(setup.data_path, PathBuf::from("/srv/data"));
    }

    #[test]
    fn symbol_override_wins() {
        let setup = prepare(&config(BASE), Some("BOOM1000")).unwrap();
        assert_eq!(setup.backtest.symbol, "BOOM1000");
    }

    #[test]
    fn defaults_without_optional_sections() {
        let setup = prepare(
            &config(
                "[backtest]\nsymbol = R_75\nstart_date = 2024-01-01\nend_date = 2024-01-31\ninitial_balance = 1000\n",
            ),
            None,
        )
        .unwrap();
        assert_eq!(setup.backtest.timeframe, Timeframe::M1);
        assert_eq!(setup.simulation, SimulationParams::default());
        assert_eq!(setup.retry, RetryConfig::default());
        assert_eq!(setup.data_path, PathBuf::from(DEFAULT_DATA_PATH));
        assert_eq!(setup.source, DataSource::Candles);
    }

    #[test]
    fn data_source_parsing() {
        let ticks = config("[data]\nsource = ticks\n");
        assert_eq!(build_data_source(&ticks).unwrap(), DataSource::Ticks);
        let bad = config("[data]\nsource = websocket\n");
        assert!(matches!(
            build_data_source(&bad),
            Err(SynthError::ConfigInvalid { ref key, .. }) if key == "source"
        ));
    }

    #[test]
    fn missing_balance_is_config_error() {
        let err = prepare(&config(&BASE.replace("initial_balance = 500\n", "")), None).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn zero_signal_interval_rejected() {
        let err = prepare(
            &config(&BASE.replace("signal_interval = 10", "signal_interval = 0")),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, SynthError::ConfigInvalid { ref key, .. } if key == "signal_interval"));
    }
}
