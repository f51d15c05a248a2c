//! MACD (Moving Average Convergence Divergence) and slope divergence.
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of the MACD Line history
//! Histogram = MACD Line - Signal Line
//!
//! Neutral default: all zeros until `max(fast, slow) + signal - 1` closes exist.

use serde::Serialize;

use super::ema::ema_series;
use super::stats::{slope, tail};
use crate::domain::candle::Candle;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

/// Samples used by the slope-sign divergence heuristic.
pub const DIVERGENCE_WINDOW: usize = 10;

/// Sign disagreement between price and an oscillator over the last
/// [`DIVERGENCE_WINDOW`] samples. A heuristic trigger, not a statistical test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Divergence {
    /// Price rising while the oscillator falls.
    Bearish,
    #[default]
    Neutral,
    /// Price falling while the oscillator rises.
    Bullish,
}

impl Divergence {
    pub fn as_i8(self) -> i8 {
        match self {
            Divergence::Bearish => -1,
            Divergence::Neutral => 0,
            Divergence::Bullish => 1,
        }
    }

    pub fn is_neutral(self) -> bool {
        self == Divergence::Neutral
    }
}

pub fn detect_divergence(prices: &[f64], oscillator: &[f64]) -> Divergence {
    if prices.len() < DIVERGENCE_WINDOW || oscillator.len() < DIVERGENCE_WINDOW {
        return Divergence::Neutral;
    }
    let price_slope = slope(tail(prices, DIVERGENCE_WINDOW));
    let osc_slope = slope(tail(oscillator, DIVERGENCE_WINDOW));

    if price_slope > 0.0 && osc_slope < 0.0 {
        Divergence::Bearish
    } else if price_slope < 0.0 && osc_slope > 0.0 {
        Divergence::Bullish
    } else {
        Divergence::Neutral
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MacdOutput {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
    pub divergence: Divergence,
}

/// MACD line for every close from index `max(fast, slow) - 1` onward.
pub fn macd_line_series(closes: &[f64], fast: usize, slow: usize) -> Vec<f64> {
    if fast == 0 || slow == 0 {
        return Vec::new();
    }
    let fast_ema = ema_series(closes, fast);
    let slow_ema = ema_series(closes, slow);
    if fast_ema.is_empty() || slow_ema.is_empty() {
        return Vec::new();
    }

    // Both series end on the last close; align them on their tails.
    let len = fast_ema.len().min(slow_ema.len());
    tail(&fast_ema, len)
        .iter()
        .zip(tail(&slow_ema, len))
        .map(|(f, s)| f - s)
        .collect()
}

pub fn calculate_macd(
    candles: &[Candle],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> MacdOutput {
    if signal_period == 0 {
        return MacdOutput::default();
    }
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let line_series = macd_line_series(&closes, fast, slow);
    let signal_series = ema_series(&line_series, signal_period);

    let (Some(&line), Some(&signal)) = (line_series.last(), signal_series.last()) else {
        return MacdOutput::default();
    };

    MacdOutput {
        line,
        signal,
        histogram: line - signal,
        divergence: detect_divergence(&closes, &line_series),
    }
}

pub fn calculate_macd_default(candles: &[Candle]) -> MacdOutput {
    calculate_macd(candles, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL)
}
