#![allow(dead_code)]

use chrono::NaiveDate;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, VecDeque};
use synthtrader::domain::backtest::{BacktestConfig, SimulationParams};
use synthtrader::domain::candle::Candle;
use synthtrader::domain::error::SynthError;
use synthtrader::domain::prediction::{
    factor, Direction, OracleRequest, Prediction, StructureQuality, TimeframeConfluence,
    TradingLevels,
};
use synthtrader::domain::tick::Tick;
use synthtrader::domain::timeframe::Timeframe;
use synthtrader::ports::market_data_port::{HistoricalRequest, MarketDataPort};
use synthtrader::ports::oracle_port::PredictionOracle;

/// 2024-01-01 00:00:00 UTC
pub const START: i64 = 1_704_067_200;

/// Market data keyed by granularity, with optional transient failures.
pub struct MockMarketData {
    pub candles: HashMap<u32, Vec<Candle>>,
    pub ticks: Vec<Tick>,
    failures_left: Cell<u32>,
    pub requests: RefCell<Vec<HistoricalRequest>>,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self {
            candles: HashMap::new(),
            ticks: Vec::new(),
            failures_left: Cell::new(0),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn with_candles(mut self, granularity: u32, candles: Vec<Candle>) -> Self {
        self.candles.insert(granularity, candles);
        self
    }

    pub fn with_ticks(mut self, ticks: Vec<Tick>) -> Self {
        self.ticks = ticks;
        self
    }

    /// The next `n` fetches fail with a transient market data error.
    pub fn failing_first(self, n: u32) -> Self {
        self.failures_left.set(n);
        self
    }

    pub fn granularities_requested(&self) -> Vec<u32> {
        self.requests.borrow().iter().map(|r| r.granularity).collect()
    }
}

impl MarketDataPort for MockMarketData {
    fn subscribe(&self, symbol: &str) -> Result<Box<dyn Iterator<Item = Tick> + '_>, SynthError> {
        let symbol = symbol.to_string();
        Ok(Box::new(
            self.ticks.iter().filter(move |t| t.symbol == symbol).cloned(),
        ))
    }

    fn fetch_historical(&self, request: &HistoricalRequest) -> Result<Vec<Candle>, SynthError> {
        self.requests.borrow_mut().push(request.clone());
        let left = self.failures_left.get();
        if left > 0 {
            self.failures_left.set(left - 1);
            return Err(SynthError::MarketData {
                reason: "connection reset".into(),
            });
        }
        Ok(self
            .candles
            .get(&request.granularity)
            .map(|c| {
                c.iter()
                    .filter(|c| c.epoch >= request.start_epoch && c.epoch <= request.end_epoch)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Replays queued responses, then repeats `fallback`. Counts every call.
pub struct ScriptedOracle {
    script: RefCell<VecDeque<Result<Prediction, SynthError>>>,
    fallback: Option<Prediction>,
    pub calls: Cell<usize>,
    pub prices_seen: RefCell<Vec<f64>>,
    pub last_request: RefCell<Option<OracleRequest>>,
}

impl ScriptedOracle {
    pub fn always(prediction: Prediction) -> Self {
        Self {
            script: RefCell::new(VecDeque::new()),
            fallback: Some(prediction),
            calls: Cell::new(0),
            prices_seen: RefCell::new(Vec::new()),
            last_request: RefCell::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            script: RefCell::new(VecDeque::new()),
            fallback: None,
            calls: Cell::new(0),
            prices_seen: RefCell::new(Vec::new()),
            last_request: RefCell::new(None),
        }
    }

    pub fn then(self, response: Result<Prediction, SynthError>) -> Self {
        self.script.borrow_mut().push_back(response);
        self
    }
}

impl PredictionOracle for ScriptedOracle {
    fn predict(&self, request: &OracleRequest) -> Result<Prediction, SynthError> {
        self.calls.set(self.calls.get() + 1);
        self.prices_seen.borrow_mut().push(request.current_price);
        *self.last_request.borrow_mut() = Some(request.clone());
        if let Some(next) = self.script.borrow_mut().pop_front() {
            return next;
        }
        self.fallback.clone().ok_or_else(|| SynthError::Oracle {
            reason: "oracle offline".into(),
        })
    }
}

pub fn oracle_error() -> SynthError {
    SynthError::Oracle {
        reason: "timeout".into(),
    }
}

pub fn make_ticks(symbol: &str, prices: &[f64], step_secs: i64) -> Vec<Tick> {
    prices
        .iter()
        .enumerate()
        .map(|(i, &p)| Tick::new(symbol, p, i as u64, START + i as i64 * step_secs, 0.01))
        .collect()
}

pub fn make_candle(symbol: &str, epoch: i64, close: f64) -> Candle {
    Candle {
        symbol: symbol.to_string(),
        open: close,
        high: close + 0.5,
        low: close - 0.5,
        close,
        epoch,
        volume: None,
    }
}

pub fn make_candles(symbol: &str, closes: &[f64], granularity: i64) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_candle(symbol, START + i as i64 * granularity, c))
        .collect()
}

pub fn make_config(symbol: &str, timeframe: Timeframe) -> BacktestConfig {
    BacktestConfig {
        symbol: symbol.to_string(),
        timeframe,
        start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        initial_balance: 1000.0,
        risk_per_trade: 0.01,
        min_confidence_threshold: 0.7,
    }
}

pub fn every(interval: u64) -> SimulationParams {
    SimulationParams {
        signal_interval: Some(interval),
        ..Default::default()
    }
}

pub fn make_prediction(direction: Direction, confidence: f64) -> Prediction {
    Prediction {
        direction,
        confidence,
        levels: TradingLevels {
            entry: 100.0,
            stop_loss: 99.0,
            take_profit: 103.0,
            risk_reward_ratio: 3.0,
        },
        factors: BTreeMap::new(),
        timeframe_confluence: TimeframeConfluence::Strong,
        structure_quality: StructureQuality::High,
    }
}

/// A prediction that clears every quality gate at default thresholds.
pub fn strong_prediction(direction: Direction) -> Prediction {
    let mut p = make_prediction(direction, 0.85);
    for (name, value) in [
        (factor::TECHNICAL_STRENGTH, 0.9),
        (factor::MOMENTUM_ALIGNMENT, 0.9),
        (factor::VOLATILITY_SUITABILITY, 0.9),
        (factor::PATTERN_CLARITY, 0.9),
        (factor::SESSION_QUALITY, 0.9),
    ] {
        p.factors.insert(name.to_string(), value);
    }
    p
}
