//! Performance statistics over a closed trade list.
//!
//! Everything is recomputed from the trades on every call.
//!
//! - win rate: winners / total * 100
//! - max drawdown: largest fall of cumulative pnl below its running peak,
//!   where the peak starts at 0 before the first trade
//! - sharpe: mean(pnl) / stddev(pnl), population stddev, no annualization
//! - profit factor: gross profit / gross loss; infinity with no losers and
//!   positive profit, 0 with no trades

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use super::position::Trade;
use super::prediction::Direction;

/// Declared direction against outcome. Up is the positive class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ConfusionMatrix {
    pub true_positive: usize,
    pub false_positive: usize,
    pub true_negative: usize,
    pub false_negative: usize,
}

impl ConfusionMatrix {
    pub fn from_trades(trades: &[Trade]) -> Self {
        let mut m = ConfusionMatrix::default();
        for trade in trades {
            match (trade.direction, trade.correct) {
                (Direction::Up, true) => m.true_positive += 1,
                (Direction::Up, false) => m.false_positive += 1,
                (Direction::Down, true) => m.true_negative += 1,
                (Direction::Down, false) => m.false_negative += 1,
            }
        }
        m
    }

    pub fn total(&self) -> usize {
        self.true_positive + self.false_positive + self.true_negative + self.false_negative
    }

    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.true_positive + self.true_negative) as f64 / total as f64
    }

    pub fn precision(&self) -> f64 {
        let predicted_up = self.true_positive + self.false_positive;
        if predicted_up == 0 {
            return 0.0;
        }
        self.true_positive as f64 / predicted_up as f64
    }
}

/// Trades grouped by the calendar period of their entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodStats {
    pub period: String,
    pub trades: usize,
    pub wins: usize,
    pub pnl: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub breakeven_trades: usize,
    /// Percent, 0 to 100.
    pub win_rate: f64,
    pub total_pnl: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub profit_factor: f64,
    pub max_drawdown: f64,
    /// Max drawdown as a percent of the initial balance.
    pub max_drawdown_pct: f64,
    pub sharpe_ratio: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub avg_confidence: f64,
    pub avg_trade_duration_minutes: f64,
    pub confusion: ConfusionMatrix,
    pub accuracy: f64,
    pub precision: f64,
    pub daily: Vec<PeriodStats>,
    pub monthly: Vec<PeriodStats>,
}

impl PerformanceMetrics {
    pub fn compute(trades: &[Trade], initial_balance: f64) -> Self {
        let mut winning_trades = 0usize;
        let mut losing_trades = 0usize;
        let mut gross_profit = 0.0_f64;
        let mut gross_loss = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;

        for trade in trades {
            let pnl = trade.pnl;
            if pnl > 0.0 {
                winning_trades += 1;
                gross_profit += pnl;
                largest_win = largest_win.max(pnl);
            } else if pnl < 0.0 {
                losing_trades += 1;
                gross_loss += pnl.abs();
                largest_loss = largest_loss.max(pnl.abs());
            }
        }

        let total_trades = trades.len();
        let pnls: Vec<f64> = trades.iter().map(|t| t.pnl).collect();
        let max_drawdown = max_drawdown(&pnls);
        let confusion = ConfusionMatrix::from_trades(trades);

        PerformanceMetrics {
            total_trades,
            winning_trades,
            losing_trades,
            breakeven_trades: total_trades - winning_trades - losing_trades,
            win_rate: ratio(winning_trades as f64, total_trades) * 100.0,
            total_pnl: pnls.iter().sum(),
            gross_profit,
            gross_loss,
            profit_factor: profit_factor(gross_profit, gross_loss),
            max_drawdown,
            max_drawdown_pct: if initial_balance > 0.0 {
                max_drawdown / initial_balance * 100.0
            } else {
                0.0
            },
            sharpe_ratio: sharpe_ratio(&pnls),
            avg_win: ratio(gross_profit, winning_trades),
            avg_loss: ratio(gross_loss, losing_trades),
            largest_win,
            largest_loss,
            avg_confidence: ratio(trades.iter().map(|t| t.confidence).sum(), total_trades),
            avg_trade_duration_minutes: ratio(
                trades.iter().map(|t| t.duration_minutes).sum(),
                total_trades,
            ),
            accuracy: confusion.accuracy(),
            precision: confusion.precision(),
            confusion,
            daily: rollup(trades, |d| d.format("%Y-%m-%d").to_string()),
            monthly: rollup(trades, |d| d.format("%Y-%m").to_string()),
        }
    }
}

fn ratio(sum: f64, count: usize) -> f64 {
    if count == 0 { 0.0 } else { sum / count as f64 }
}

pub fn profit_factor(gross_profit: f64, gross_loss: f64) -> f64 {
    if gross_loss > 0.0 {
        gross_profit / gross_loss
    } else if gross_profit > 0.0 {
        f64::INFINITY
    } else {
        0.0
    }
}

pub fn max_drawdown(pnls: &[f64]) -> f64 {
    let mut cumulative = 0.0_f64;
    let mut peak = 0.0_f64;
    let mut max_dd = 0.0_f64;
    for pnl in pnls {
        cumulative += pnl;
        peak = peak.max(cumulative);
        max_dd = max_dd.max(peak - cumulative);
    }
    max_dd
}

pub fn sharpe_ratio(pnls: &[f64]) -> f64 {
    if pnls.len() < 2 {
        return 0.0;
    }
    let n = pnls.len() as f64;
    let mean = pnls.iter().sum::<f64>() / n;
    let variance = pnls.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();
    if stddev > 0.0 { mean / stddev } else { 0.0 }
}

fn rollup(trades: &[Trade], key: impl Fn(NaiveDate) -> String) -> Vec<PeriodStats> {
    let mut groups: BTreeMap<String, PeriodStats> = BTreeMap::new();
    for trade in trades {
        let Some(date) = trade.entry_date() else {
            continue;
        };
        let period = key(date);
        let stats = groups
            .entry(period.clone())
            .or_insert_with(|| PeriodStats {
                period,
                trades: 0,
                wins: 0,
                pnl: 0.0,
            });
        stats.trades += 1;
        if trade.pnl > 0.0 {
            stats.wins += 1;
        }
        stats.pnl += trade.pnl;
    }
    groups.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::ExitReason;

    const DAY: i64 = 86_400;
    // 2024-01-01 00:00:00 UTC
    const JAN_1: i64 = 1_704_067_200;

    fn make_trade(direction: Direction, pnl: f64, entry_epoch: i64) -> Trade {
        Trade {
            symbol: "R_100".into(),
            direction,
            entry_epoch,
            exit_epoch: entry_epoch + 600,
            entry_price: 100.0,
            exit_price: 100.0,
            pnl,
            confidence: 0.8,
            duration_minutes: 10.0,
            correct: pnl > 0.0,
            exit_reason: ExitReason::TakeProfit,
        }
    }

    #[test]
    fn empty_trade_list() {
        let m = PerformanceMetrics::compute(&[], 1000.0);
        assert_eq!(m.total_trades, 0);
        assert_eq!(m.win_rate, 0.0);
        assert_eq!(m.profit_factor, 0.0);
        assert_eq!(m.max_drawdown, 0.0);
        assert_eq!(m.sharpe_ratio, 0.0);
        assert!(m.daily.is_empty());
    }

    #[test]
    fn wins_and_losses() {
        let trades = vec![
            make_trade(Direction::Up, 10.0, JAN_1),
            make_trade(Direction::Down, -5.0, JAN_1 + 60),
            make_trade(Direction::Up, 20.0, JAN_1 + 120),
            make_trade(Direction::Down, 0.0, JAN_1 + 180),
        ];
        let m = PerformanceMetrics::compute(&trades, 1000.0);
        assert_eq!(m.winning_trades, 2);
        assert_eq!(m.losing_trades, 1);
        assert_eq!(m.breakeven_trades, 1);
        assert!((m.win_rate - 50.0).abs() < 1e-12);
        assert!((m.total_pnl - 25.0).abs() < 1e-12);
        assert!((m.profit_factor - 6.0).abs() < 1e-12);
        assert!((m.avg_win - 15.0).abs() < 1e-12);
        assert!((m.largest_loss - 5.0).abs() < 1e-12);
        assert!((m.avg_trade_duration_minutes - 10.0).abs() < 1e-12);
    }

    #[test]
    fn profit_factor_sentinels() {
        assert_eq!(profit_factor(0.0, 0.0), 0.0);
        assert_eq!(profit_factor(5.0, 0.0), f64::INFINITY);
        assert!((profit_factor(6.0, 3.0) - 2.0).abs() < 1e-12);
        let m = PerformanceMetrics::compute(&[make_trade(Direction::Up, 1.0, JAN_1)], 1000.0);
        assert!(m.profit_factor.is_infinite());
    }

    #[test]
    fn drawdown_from_peak() {
        // cumulative: 10, 5, 25, 5, 15 -> peak 25, trough 5
        let dd = max_drawdown(&[10.0, -5.0, 20.0, -20.0, 10.0]);
        assert!((dd - 20.0).abs() < 1e-12);
        // first trade losing: peak starts at 0
        assert!((max_drawdown(&[-3.0, 1.0]) - 3.0).abs() < 1e-12);
        assert_eq!(max_drawdown(&[1.0, 2.0, 0.0, 3.0]), 0.0);
    }

    #[test]
    fn drawdown_pct_of_initial_balance() {
        let trades = vec![
            make_trade(Direction::Up, 100.0, JAN_1),
            make_trade(Direction::Up, -250.0, JAN_1 + 60),
        ];
        let m = PerformanceMetrics::compute(&trades, 1000.0);
        assert!((m.max_drawdown - 250.0).abs() < 1e-12);
        assert!((m.max_drawdown_pct - 25.0).abs() < 1e-12);
    }

    #[test]
    fn sharpe_is_mean_over_stddev() {
        // mean 2, population stddev 1
        assert!((sharpe_ratio(&[1.0, 3.0]) - 2.0).abs() < 1e-12);
        assert_eq!(sharpe_ratio(&[2.0, 2.0]), 0.0);
        assert_eq!(sharpe_ratio(&[2.0]), 0.0);
    }

    #[test]
    fn confusion_buckets() {
        let trades = vec![
            make_trade(Direction::Up, 1.0, JAN_1),
            make_trade(Direction::Up, -1.0, JAN_1),
            make_trade(Direction::Up, 2.0, JAN_1),
            make_trade(Direction::Down, 1.0, JAN_1),
            make_trade(Direction::Down, -1.0, JAN_1),
        ];
        let c = ConfusionMatrix::from_trades(&trades);
        assert_eq!(c.true_positive, 2);
        assert_eq!(c.false_positive, 1);
        assert_eq!(c.true_negative, 1);
        assert_eq!(c.false_negative, 1);
        assert!((c.accuracy() - 0.6).abs() < 1e-12);
        assert!((c.precision() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn daily_and_monthly_rollups() {
        let trades = vec![
            make_trade(Direction::Up, 1.0, JAN_1),
            make_trade(Direction::Up, -2.0, JAN_1 + 3600),
            make_trade(Direction::Up, 4.0, JAN_1 + DAY),
            make_trade(Direction::Up, 8.0, JAN_1 + 31 * DAY),
        ];
        let m = PerformanceMetrics::compute(&trades, 1000.0);

        assert_eq!(m.daily.len(), 3);
        assert_eq!(m.daily[0].period, "2024-01-01");
        assert_eq!(m.daily[0].trades, 2);
        assert_eq!(m.daily[0].wins, 1);
        assert!((m.daily[0].pnl + 1.0).abs() < 1e-12);
        assert_eq!(m.daily[2].period, "2024-02-01");

        assert_eq!(m.monthly.len(), 2);
        assert_eq!(m.monthly[0].period, "2024-01");
        assert_eq!(m.monthly[0].trades, 3);
        assert_eq!(m.monthly[1].period, "2024-02");
    }
}
