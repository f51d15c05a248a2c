//! Backtest configuration, simulation loop and result record.
//!
//! The simulator replays ticks in epoch order through a run-private
//! [`BufferRegistry`]. Every `signal_interval` stored ticks with no open
//! position it builds a feature snapshot and asks the oracle for a signal.
//! An open position is checked against its exit rule on every tick and is
//! force-closed at the last tick when data runs out.
//!
//! Fetched history replays through [`run_backtest_on_candles`]: the candles
//! reach the indicators and the oracle as served, and each close acts as
//! the tick that drives cadence and exits.

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use super::buffer::{BufferCapacity, BufferRegistry, Ingest};
use super::candle::Candle;
use super::error::SynthError;
use super::features::FeatureSnapshot;
use super::gate::{Gate, GateContext, GateDecision, GateThresholds, QualityGateFilter};
use super::history::{candles_to_ticks, validate_ticks};
use super::metrics::PerformanceMetrics;
use super::position::{ExitParams, ExitReason, Position, Trade};
use super::prediction::{OracleRequest, Prediction};
use super::symbol::SymbolConfiguration;
use super::tick::Tick;
use super::timeframe::Timeframe;
use crate::ports::oracle_port::PredictionOracle;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestConfig {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_balance: f64,
    pub risk_per_trade: f64,
    pub min_confidence_threshold: f64,
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), SynthError> {
        if self.symbol.trim().is_empty() {
            return Err(SynthError::invalid("backtest", "symbol", "must not be empty"));
        }
        if !(self.initial_balance.is_finite() && self.initial_balance > 0.0) {
            return Err(SynthError::invalid(
                "backtest",
                "initial_balance",
                "must be greater than 0",
            ));
        }
        if !(0.0..=1.0).contains(&self.risk_per_trade) {
            return Err(SynthError::invalid(
                "backtest",
                "risk_per_trade",
                "must be between 0 and 1",
            ));
        }
        if !(0.0..=1.0).contains(&self.min_confidence_threshold) {
            return Err(SynthError::invalid(
                "backtest",
                "min_confidence_threshold",
                "must be between 0 and 1",
            ));
        }
        if self.start_date >= self.end_date {
            return Err(SynthError::invalid(
                "backtest",
                "start_date",
                "must be before end_date",
            ));
        }
        Ok(())
    }

    /// First second of `start_date`, UTC.
    pub fn start_epoch(&self) -> i64 {
        self.start_date.and_time(NaiveTime::MIN).and_utc().timestamp()
    }

    /// Last second of `end_date`, UTC.
    pub fn end_epoch(&self) -> i64 {
        self.end_date.and_time(NaiveTime::MIN).and_utc().timestamp() + 86_399
    }
}

/// Tunables of the simulation loop that are not part of [`BacktestConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationParams {
    /// Finished candles handed to the indicators and the oracle.
    pub candle_window: usize,
    /// Fewer finished candles than this means no oracle call.
    pub min_candles: usize,
    /// Upper bound on the confidence a signal needs to open a position.
    pub confidence_floor: f64,
    pub exits: ExitParams,
    pub capacity: BufferCapacity,
    /// Overrides the timeframe's tick cadence.
    pub signal_interval: Option<u64>,
    pub quality_gate: Option<GateThresholds>,
}

impl Default for SimulationParams {
    fn default() -> Self {
        SimulationParams {
            candle_window: 50,
            min_candles: 2,
            confidence_floor: 0.6,
            exits: ExitParams::default(),
            capacity: BufferCapacity::default(),
            signal_interval: None,
            quality_gate: None,
        }
    }
}

impl SimulationParams {
    pub fn validate(&self) -> Result<(), SynthError> {
        if self.candle_window == 0 {
            return Err(SynthError::invalid("simulation", "candle_window", "must be at least 1"));
        }
        if self.capacity.ticks == 0 || self.capacity.candles == 0 {
            return Err(SynthError::invalid(
                "simulation",
                "capacity",
                "buffer capacities must be at least 1",
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence_floor) {
            return Err(SynthError::invalid(
                "exits",
                "confidence_floor",
                "must be between 0 and 1",
            ));
        }
        if self.exits.stop_loss_pct <= 0.0 || self.exits.take_profit_pct <= 0.0 {
            return Err(SynthError::invalid(
                "exits",
                "stop_loss_pct",
                "exit percentages must be positive",
            ));
        }
        if self.exits.multiplier_base < 0.0 {
            return Err(SynthError::invalid(
                "exits",
                "confidence_multiplier_base",
                "must not be negative",
            ));
        }
        if self.signal_interval == Some(0) {
            return Err(SynthError::invalid("simulation", "signal_interval", "must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    pub config: BacktestConfig,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Percent, 0 to 100.
    pub win_rate: f64,
    pub total_pnl: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub profit_factor: f64,
    pub avg_trade_duration_minutes: f64,
    pub final_balance: f64,
    pub signals_evaluated: u64,
    pub oracle_failures: u64,
    pub gate_rejections: BTreeMap<Gate, u64>,
    pub trades: Vec<Trade>,
    pub performance_metrics: PerformanceMetrics,
}

impl BacktestResult {
    fn from_trades(
        config: &BacktestConfig,
        trades: Vec<Trade>,
        final_balance: f64,
        counters: RunCounters,
    ) -> Self {
        let metrics = PerformanceMetrics::compute(&trades, config.initial_balance);
        BacktestResult {
            config: config.clone(),
            total_trades: metrics.total_trades,
            winning_trades: metrics.winning_trades,
            losing_trades: metrics.losing_trades,
            win_rate: metrics.win_rate,
            total_pnl: metrics.total_pnl,
            max_drawdown: metrics.max_drawdown,
            sharpe_ratio: metrics.sharpe_ratio,
            profit_factor: metrics.profit_factor,
            avg_trade_duration_minutes: metrics.avg_trade_duration_minutes,
            final_balance,
            signals_evaluated: counters.signals_evaluated,
            oracle_failures: counters.oracle_failures,
            gate_rejections: counters.gate_rejections,
            trades,
            performance_metrics: metrics,
        }
    }

    pub fn total_gate_rejections(&self) -> u64 {
        self.gate_rejections.values().sum()
    }
}

#[derive(Debug, Default)]
struct RunCounters {
    signals_evaluated: u64,
    oracle_failures: u64,
    gate_rejections: BTreeMap<Gate, u64>,
}

/// Replays `ticks` for `config.symbol` and returns the complete result.
/// Candles are built from the ticks at the timeframe width.
///
/// Data integrity is checked before the first tick is replayed. Oracle
/// failures are logged and counted; they never abort the run.
pub fn run_backtest(
    config: &BacktestConfig,
    ticks: &[Tick],
    oracle: &dyn PredictionOracle,
    params: &SimulationParams,
) -> Result<BacktestResult, SynthError> {
    simulate(config, ticks, None, oracle, params)
}

/// Replays fetched candles, one close tick per candle. Each candle enters
/// the buffer together with its close tick, so the oracle window holds the
/// served open, high, low and volume.
pub fn run_backtest_on_candles(
    config: &BacktestConfig,
    candles: &[Candle],
    oracle: &dyn PredictionOracle,
    params: &SimulationParams,
) -> Result<BacktestResult, SynthError> {
    let pip_size = SymbolConfiguration::for_symbol(&config.symbol).pip_size;
    let ticks = candles_to_ticks(candles, pip_size);
    simulate(config, &ticks, Some(candles), oracle, params)
}

/// `fetched[i]` is the candle whose close is `ticks[i]`.
fn simulate(
    config: &BacktestConfig,
    ticks: &[Tick],
    fetched: Option<&[Candle]>,
    oracle: &dyn PredictionOracle,
    params: &SimulationParams,
) -> Result<BacktestResult, SynthError> {
    config.validate()?;
    params.validate()?;
    if ticks.is_empty() {
        return Err(SynthError::DataUnavailable {
            symbol: config.symbol.clone(),
            reason: "no ticks to replay".into(),
        });
    }
    validate_ticks(ticks)?;

    let interval = params
        .signal_interval
        .unwrap_or_else(|| config.timeframe.signal_tick_interval());
    let max_holding = config.timeframe.max_holding_secs();

    let mut registry = match fetched {
        Some(_) => BufferRegistry::with_fetched_candles(params.capacity),
        None => BufferRegistry::new(
            i64::from(config.timeframe.granularity_secs()),
            params.capacity,
        ),
    };
    let mut gate = params.quality_gate.map(QualityGateFilter::new);
    let mut counters = RunCounters::default();

    let mut balance = config.initial_balance;
    let mut position: Option<Position> = None;
    let mut trades: Vec<Trade> = Vec::new();
    let mut stored: u64 = 0;

    info!(
        symbol = %config.symbol,
        timeframe = %config.timeframe,
        ticks = ticks.len(),
        interval,
        "starting backtest"
    );

    for (i, tick) in ticks.iter().enumerate() {
        if tick.symbol != config.symbol {
            continue;
        }
        if let Ingest::Rejected(_) = registry.ingest(tick.clone()) {
            continue;
        }
        if let Some(candle) = fetched.and_then(|c| c.get(i)) {
            // Epochs match the tick just accepted; the buffer logs any rejection.
            let _ = registry.add_candle(candle.clone());
        }
        stored += 1;

        if let Some(open) = position.take() {
            match open.exit_reason(tick.price, tick.epoch) {
                Some(reason) => {
                    let trade =
                        open.close(tick.price, tick.epoch, balance, config.risk_per_trade, reason);
                    balance += trade.pnl;
                    debug!(pnl = trade.pnl, ?reason, balance, "position closed");
                    trades.push(trade);
                }
                None => position = Some(open),
            }
            continue;
        }

        if stored % interval != 0 {
            continue;
        }

        let Some(prediction) = request_signal(config, params, &registry, tick, oracle, &mut counters)
        else {
            continue;
        };

        if let Some(filter) = gate.as_mut() {
            let ctx = GateContext {
                symbol: &config.symbol,
                max_risk_per_trade: config.risk_per_trade,
            };
            if let GateDecision::Rejected(reason) = filter.evaluate(&prediction, ctx) {
                *counters.gate_rejections.entry(reason.gate).or_insert(0) += 1;
                continue;
            }
        }

        let threshold = config.min_confidence_threshold.min(params.confidence_floor);
        if prediction.confidence < threshold {
            debug!(confidence = prediction.confidence, threshold, "signal below threshold");
            continue;
        }

        debug!(
            direction = %prediction.direction,
            confidence = prediction.confidence,
            price = tick.price,
            "position opened"
        );
        position = Some(Position::open(
            &config.symbol,
            prediction.direction,
            tick.price,
            tick.epoch,
            prediction.confidence,
            &params.exits,
            max_holding,
        ));
    }

    if let Some(open) = position.take() {
        let last = registry
            .buffer(&config.symbol)
            .and_then(|b| b.last_tick())
            .map(|t| (t.price, t.epoch));
        if let Some((price, epoch)) = last {
            let trade = open.close(price, epoch, balance, config.risk_per_trade, ExitReason::EndOfData);
            balance += trade.pnl;
            trades.push(trade);
        }
    }

    info!(
        symbol = %config.symbol,
        trades = trades.len(),
        final_balance = balance,
        oracle_failures = counters.oracle_failures,
        "backtest finished"
    );

    Ok(BacktestResult::from_trades(config, trades, balance, counters))
}

/// Builds the oracle request for the current tick and returns a validated
/// prediction, or `None` when there is no usable signal this cycle.
fn request_signal(
    config: &BacktestConfig,
    params: &SimulationParams,
    registry: &BufferRegistry,
    tick: &Tick,
    oracle: &dyn PredictionOracle,
    counters: &mut RunCounters,
) -> Option<Prediction> {
    let buffer = registry.buffer(&config.symbol)?;
    let candles = buffer.recent_candles(params.candle_window);
    if candles.len() < params.min_candles {
        return None;
    }
    let features = FeatureSnapshot::build(registry, &config.symbol, params.candle_window)?;

    let request = OracleRequest {
        symbol: config.symbol.clone(),
        timeframe: config.timeframe,
        current_price: tick.price,
        features,
        candles,
    };

    counters.signals_evaluated += 1;
    match oracle.predict(&request).and_then(|p| p.validate().map(|()| p)) {
        Ok(prediction) => Some(prediction),
        Err(e) => {
            warn!(symbol = %config.symbol, epoch = tick.epoch, error = %e, "no signal this cycle");
            counters.oracle_failures += 1;
            None
        }
    }
}
