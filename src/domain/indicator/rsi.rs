//! RSI (Relative Strength Index) and Stochastic RSI.
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - First average: simple mean of gains/losses over the first n deltas
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100
//!
//! Neutral default: 50 when fewer than n+1 closes exist.

use super::stats::tail;
use crate::domain::candle::Candle;

pub const NEUTRAL_RSI: f64 = 50.0;
/// Number of RSI values the Stochastic RSI normalizes against.
pub const STOCH_RSI_WINDOW: usize = 14;

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}

/// RSI value for every close from index `period` onward.
///
/// Empty when `period == 0` or fewer than `period + 1` closes exist.
pub fn rsi_series(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period + 1 {
        return Vec::new();
    }

    let mut gains: Vec<f64> = Vec::with_capacity(closes.len() - 1);
    let mut losses: Vec<f64> = Vec::with_capacity(closes.len() - 1);
    for w in closes.windows(2) {
        let change = w[1] - w[0];
        gains.push(if change > 0.0 { change } else { 0.0 });
        losses.push(if change < 0.0 { -change } else { 0.0 });
    }

    let mut avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period as f64;

    let mut values = Vec::with_capacity(gains.len() - period + 1);
    values.push(rsi_from_averages(avg_gain, avg_loss));

    for i in period..gains.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[i]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[i]) / period as f64;
        values.push(rsi_from_averages(avg_gain, avg_loss));
    }

    values
}

/// Latest RSI of the window, or 50 with insufficient history.
pub fn calculate_rsi(candles: &[Candle], period: usize) -> f64 {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    rsi_series(&closes, period)
        .last()
        .copied()
        .unwrap_or(NEUTRAL_RSI)
}

/// Normalizes the newest RSI against the min/max of the last
/// [`STOCH_RSI_WINDOW`] RSI values, scaled to 0-100.
///
/// Neutral default: 50 with fewer than 14 RSI values or a flat RSI window.
pub fn stoch_rsi_from_series(rsi_values: &[f64]) -> f64 {
    if rsi_values.len() < STOCH_RSI_WINDOW {
        return NEUTRAL_RSI;
    }
    let window = tail(rsi_values, STOCH_RSI_WINDOW);
    let min = window.iter().copied().fold(f64::INFINITY, f64::min);
    let max = window.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if range == 0.0 {
        return NEUTRAL_RSI;
    }
    let current = window[window.len() - 1];
    (current - min) / range * 100.0
}

pub fn calculate_stoch_rsi(candles: &[Candle], period: usize) -> f64 {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    stoch_rsi_from_series(&rsi_series(&closes, period))
}
