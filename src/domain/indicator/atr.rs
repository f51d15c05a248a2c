//! Average True Range.
//!
//! True range needs a previous close, so the first candle only seeds it.
//! Seed = mean of the first n true ranges, then Wilder smoothing:
//! ATR = (prev_atr * (n-1) + TR) / n.
//!
//! Normalized ATR = ATR / current close * 100, comparable across symbols.
//! Neutral default: 0 for both until n+1 candles exist.

use serde::Serialize;

use crate::domain::candle::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct AtrOutput {
    pub atr: f64,
    pub normalized: f64,
}

pub fn calculate_atr(candles: &[Candle], period: usize) -> AtrOutput {
    if period == 0 || candles.len() < period + 1 {
        return AtrOutput::default();
    }

    let tr_values: Vec<f64> = candles
        .windows(2)
        .map(|w| w[1].true_range(w[0].close))
        .collect();

    let mut atr = tr_values[..period].iter().sum::<f64>() / period as f64;
    for &tr in &tr_values[period..] {
        atr = (atr * (period - 1) as f64 + tr) / period as f64;
    }

    let close = candles[candles.len() - 1].close;
    let normalized = if close > 0.0 { atr / close * 100.0 } else { 0.0 };

    AtrOutput { atr, normalized }
}
