//! Cached strategy validation gate.
//!
//! Before live signals for a (symbol, timeframe) are trusted, a full
//! backtest over the trailing 90 days must meet every criterion:
//! win rate >= 60%, profit factor >= 1.5, at least 10 trades, positive total
//! pnl, max drawdown < 20% of the initial balance. A pass is cached for
//! 12 hours. Failures are never cached.

use chrono::{DateTime, Duration};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::info;

use super::backtest::{BacktestConfig, BacktestResult};
use super::error::SynthError;
use super::timeframe::Timeframe;

pub const VALIDATION_WINDOW_DAYS: i64 = 90;
pub const CACHE_TTL_SECS: i64 = 12 * 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Criterion {
    WinRate,
    ProfitFactor,
    TradeCount,
    TotalPnl,
    MaxDrawdown,
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Criterion::WinRate => "win_rate",
            Criterion::ProfitFactor => "profit_factor",
            Criterion::TradeCount => "trade_count",
            Criterion::TotalPnl => "total_pnl",
            Criterion::MaxDrawdown => "max_drawdown",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationCriteria {
    /// Percent.
    pub min_win_rate: f64,
    pub min_profit_factor: f64,
    pub min_trades: usize,
    /// Percent of initial balance, exclusive.
    pub max_drawdown_pct: f64,
}

impl Default for ValidationCriteria {
    fn default() -> Self {
        ValidationCriteria {
            min_win_rate: 60.0,
            min_profit_factor: 1.5,
            min_trades: 10,
            max_drawdown_pct: 20.0,
        }
    }
}

impl ValidationCriteria {
    /// First failed criterion, checked in a fixed order.
    pub fn check(&self, result: &BacktestResult) -> Result<(), (Criterion, String)> {
        let m = &result.performance_metrics;
        if m.win_rate < self.min_win_rate {
            return Err((
                Criterion::WinRate,
                format!("win rate {:.1}% < {}%", m.win_rate, self.min_win_rate),
            ));
        }
        if m.profit_factor < self.min_profit_factor {
            return Err((
                Criterion::ProfitFactor,
                format!("profit factor {:.2} < {}", m.profit_factor, self.min_profit_factor),
            ));
        }
        if m.total_trades < self.min_trades {
            return Err((
                Criterion::TradeCount,
                format!("{} trades < {}", m.total_trades, self.min_trades),
            ));
        }
        if m.total_pnl <= 0.0 {
            return Err((
                Criterion::TotalPnl,
                format!("total pnl {:.2} is not positive", m.total_pnl),
            ));
        }
        if m.max_drawdown_pct >= self.max_drawdown_pct {
            return Err((
                Criterion::MaxDrawdown,
                format!(
                    "max drawdown {:.1}% >= {}%",
                    m.max_drawdown_pct, self.max_drawdown_pct
                ),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Passed { validated_at: i64, cached: bool },
    Failed { criterion: Criterion, detail: String },
}

impl ValidationOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, ValidationOutcome::Passed { .. })
    }
}

#[derive(Debug, Clone)]
pub struct StrategyValidator {
    criteria: ValidationCriteria,
    ttl_secs: i64,
    passes: HashMap<(String, Timeframe), i64>,
}

impl Default for StrategyValidator {
    fn default() -> Self {
        StrategyValidator::new(ValidationCriteria::default())
    }
}

impl StrategyValidator {
    pub fn new(criteria: ValidationCriteria) -> Self {
        StrategyValidator {
            criteria,
            ttl_secs: CACHE_TTL_SECS,
            passes: HashMap::new(),
        }
    }

    /// `base` with its dates replaced by the 90 days ending on `now_epoch`'s date.
    pub fn window_config(base: &BacktestConfig, now_epoch: i64) -> Result<BacktestConfig, SynthError> {
        let today = DateTime::from_timestamp(now_epoch, 0)
            .map(|t| t.date_naive())
            .ok_or_else(|| SynthError::invalid("validation", "now", "timestamp out of range"))?;
        Ok(BacktestConfig {
            start_date: today - Duration::days(VALIDATION_WINDOW_DAYS),
            end_date: today,
            ..base.clone()
        })
    }

    /// True while a cached pass for the key is younger than the TTL.
    pub fn is_validated(&self, symbol: &str, timeframe: Timeframe, now_epoch: i64) -> bool {
        self.passes
            .get(&(symbol.to_string(), timeframe))
            .is_some_and(|&at| now_epoch - at < self.ttl_secs)
    }

    pub fn invalidate(&mut self, symbol: &str, timeframe: Timeframe) {
        self.passes.remove(&(symbol.to_string(), timeframe));
    }

    /// Returns the cached pass when still fresh; otherwise runs `run` over
    /// the trailing window and checks the result.
    pub fn validate<F>(
        &mut self,
        base: &BacktestConfig,
        now_epoch: i64,
        run: F,
    ) -> Result<ValidationOutcome, SynthError>
    where
        F: FnOnce(&BacktestConfig) -> Result<BacktestResult, SynthError>,
    {
        let key = (base.symbol.clone(), base.timeframe);
        match self.passes.get(&key) {
            Some(&at) if now_epoch - at < self.ttl_secs => {
                return Ok(ValidationOutcome::Passed {
                    validated_at: at,
                    cached: true,
                });
            }
            Some(_) => {
                self.passes.remove(&key);
            }
            None => {}
        }

        let window = Self::window_config(base, now_epoch)?;
        let result = run(&window)?;

        match self.criteria.check(&result) {
            Ok(()) => {
                info!(symbol = %key.0, timeframe = %key.1, "strategy validated");
                self.passes.insert(key, now_epoch);
                Ok(ValidationOutcome::Passed {
                    validated_at: now_epoch,
                    cached: false,
                })
            }
            Err((criterion, detail)) => {
                info!(symbol = %key.0, timeframe = %key.1, %criterion, %detail, "strategy validation failed");
                Ok(ValidationOutcome::Failed { criterion, detail })
            }
        }
    }
}
