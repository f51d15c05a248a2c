//! Technical indicators over a candle window.
//!
//! Every function here is a pure function of the candles it is given and
//! returns a documented neutral value when the window is too short, so
//! callers never have to handle a short-history error.

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod stats;
pub mod stochastic;

use serde::Serialize;

use crate::domain::candle::Candle;
use crate::domain::symbol::SymbolConfiguration;

pub use atr::AtrOutput;
pub use bollinger::BollingerOutput;
pub use macd::{Divergence, MacdOutput};

/// Every indicator the engine derives from one candle window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorSet {
    pub rsi: f64,
    pub stoch_rsi: f64,
    /// Price vs RSI slope disagreement.
    pub rsi_divergence: Divergence,
    pub macd: MacdOutput,
    pub atr: AtrOutput,
    pub bollinger: BollingerOutput,
    pub stochastic: f64,
    pub williams_r: f64,
    pub last_close: f64,
    pub candle_count: usize,
}

pub fn compute_indicators(candles: &[Candle], config: &SymbolConfiguration) -> IndicatorSet {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

    let rsi_values = rsi::rsi_series(&closes, config.rsi_period);
    let rsi_value = rsi_values.last().copied().unwrap_or(rsi::NEUTRAL_RSI);
    let stochastic = stochastic::calculate_stochastic(candles, config.stochastic_period);

    IndicatorSet {
        rsi: rsi_value,
        stoch_rsi: rsi::stoch_rsi_from_series(&rsi_values),
        rsi_divergence: macd::detect_divergence(&closes, &rsi_values),
        macd: macd::calculate_macd(
            candles,
            config.macd_fast,
            config.macd_slow,
            config.macd_signal,
        ),
        atr: atr::calculate_atr(candles, config.atr_period),
        bollinger: bollinger::calculate_bollinger(
            candles,
            config.bollinger_period,
            config.bollinger_mult,
        ),
        stochastic,
        williams_r: stochastic - 100.0,
        last_close: closes.last().copied().unwrap_or(0.0),
        candle_count: candles.len(),
    }
}
