//! Simulated position lifecycle and closed trade records.
//!
//! Exit levels scale with confidence through one multiplier
//! `m = multiplier_base + confidence`:
//! stop distance = stop_loss_pct / m, target distance = take_profit_pct * m.
//! Higher confidence tightens the stop and widens the target.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use super::prediction::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExitParams {
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub multiplier_base: f64,
}

impl Default for ExitParams {
    fn default() -> Self {
        ExitParams {
            stop_loss_pct: 0.01,
            take_profit_pct: 0.02,
            multiplier_base: 0.5,
        }
    }
}

impl ExitParams {
    pub fn multiplier(&self, confidence: f64) -> f64 {
        self.multiplier_base + confidence
    }

    /// (stop distance, target distance) as fractions of entry price.
    pub fn distances(&self, confidence: f64) -> (f64, f64) {
        let m = self.multiplier(confidence);
        if m <= 0.0 {
            return (self.stop_loss_pct, self.take_profit_pct);
        }
        (self.stop_loss_pct / m, self.take_profit_pct * m)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    MaxDuration,
    EndOfData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub entry_epoch: i64,
    pub confidence: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub max_holding_secs: i64,
}

impl Position {
    pub fn open(
        symbol: &str,
        direction: Direction,
        entry_price: f64,
        entry_epoch: i64,
        confidence: f64,
        exits: &ExitParams,
        max_holding_secs: i64,
    ) -> Self {
        let (stop_dist, target_dist) = exits.distances(confidence);
        let sign = direction.sign();
        Position {
            symbol: symbol.to_string(),
            direction,
            entry_price,
            entry_epoch,
            confidence,
            stop_loss: entry_price * (1.0 - sign * stop_dist),
            take_profit: entry_price * (1.0 + sign * target_dist),
            max_holding_secs,
        }
    }

    /// Signed fractional move from entry, positive when the trade is winning.
    pub fn directional_move(&self, price: f64) -> f64 {
        if self.entry_price == 0.0 {
            return 0.0;
        }
        self.direction.sign() * (price - self.entry_price) / self.entry_price
    }

    /// Stop-loss wins ties with take-profit; both win over the time limit.
    pub fn exit_reason(&self, price: f64, epoch: i64) -> Option<ExitReason> {
        let (hit_stop, hit_target) = match self.direction {
            Direction::Up => (price <= self.stop_loss, price >= self.take_profit),
            Direction::Down => (price >= self.stop_loss, price <= self.take_profit),
        };
        if hit_stop {
            Some(ExitReason::StopLoss)
        } else if hit_target {
            Some(ExitReason::TakeProfit)
        } else if epoch - self.entry_epoch >= self.max_holding_secs {
            Some(ExitReason::MaxDuration)
        } else {
            None
        }
    }

    /// Realized pnl = balance * risk_per_trade * directional move.
    pub fn close(
        self,
        exit_price: f64,
        exit_epoch: i64,
        balance: f64,
        risk_per_trade: f64,
        reason: ExitReason,
    ) -> Trade {
        let pnl = balance * risk_per_trade * self.directional_move(exit_price);
        Trade {
            symbol: self.symbol,
            direction: self.direction,
            entry_epoch: self.entry_epoch,
            exit_epoch,
            entry_price: self.entry_price,
            exit_price,
            pnl,
            confidence: self.confidence,
            duration_minutes: (exit_epoch - self.entry_epoch) as f64 / 60.0,
            correct: pnl > 0.0,
            exit_reason: reason,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub symbol: String,
    pub direction: Direction,
    pub entry_epoch: i64,
    pub exit_epoch: i64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub pnl: f64,
    pub confidence: f64,
    pub duration_minutes: f64,
    pub correct: bool,
    pub exit_reason: ExitReason,
}

impl Trade {
    pub fn entry_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.entry_epoch, 0)
    }

    pub fn entry_date(&self) -> Option<NaiveDate> {
        self.entry_time().map(|t| t.date_naive())
    }
}
