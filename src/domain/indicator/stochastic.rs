//! Stochastic Oscillator (%K) and Williams %R.
//!
//! %K = (close - lowest_low) / (highest_high - lowest_low) * 100 over n candles.
//! Williams %R = %K - 100.
//!
//! Neutral default: %K = 50 (so %R = -50) with fewer than n candles or a
//! zero high-low range.

use crate::domain::candle::Candle;

pub const NEUTRAL_STOCHASTIC: f64 = 50.0;

pub fn calculate_stochastic(candles: &[Candle], period: usize) -> f64 {
    if period == 0 || candles.len() < period {
        return NEUTRAL_STOCHASTIC;
    }
    let window = &candles[candles.len() - period..];
    let lowest = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    let highest = window
        .iter()
        .map(|c| c.high)
        .fold(f64::NEG_INFINITY, f64::max);
    let range = highest - lowest;
    if range == 0.0 {
        return NEUTRAL_STOCHASTIC;
    }
    let close = window[window.len() - 1].close;
    (close - lowest) / range * 100.0
}

pub fn calculate_williams_r(candles: &[Candle], period: usize) -> f64 {
    calculate_stochastic(candles, period) - 100.0
}
