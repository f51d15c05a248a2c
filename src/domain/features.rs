//! Feature snapshot: everything the oracle sees about one symbol right now.
//!
//! A snapshot is a pure function of a [`BufferRegistry`]'s current contents.
//! It is rebuilt on demand and never stored.

use chrono::{DateTime, Timelike};
use serde::Serialize;

use super::buffer::BufferRegistry;
use super::candle::Candle;
use super::indicator::{compute_indicators, IndicatorSet};
use super::regime::{classify, RegimeState};
use super::spike::SpikeAnalysis;
use super::symbol::SymbolConfiguration;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureSnapshot {
    pub symbol: String,
    pub epoch: i64,
    pub price: f64,
    /// Relative change between the last two ticks.
    pub velocity: f64,
    /// Change in velocity over the last three ticks.
    pub acceleration: f64,
    pub indicators: IndicatorSet,
    pub regime: RegimeState,
    /// Present only for spike-prone symbols.
    pub spike: Option<SpikeAnalysis>,
    pub session_strength: f64,
}

/// Liquidity weighting of the UTC trading sessions.
pub fn session_strength(hour: u32) -> f64 {
    match hour {
        0..=6 => 0.6,
        7..=11 => 0.9,
        12..=15 => 1.0,
        16..=20 => 0.8,
        _ => 0.5,
    }
}

fn relative(curr: f64, prev: f64) -> f64 {
    if prev == 0.0 {
        0.0
    } else {
        (curr - prev) / prev
    }
}

/// (velocity, acceleration) from the tail of a price series.
pub fn motion(prices: &[f64]) -> (f64, f64) {
    match prices {
        [.., a, b, c] => {
            let v_prev = relative(*b, *a);
            let v = relative(*c, *b);
            (v, v - v_prev)
        }
        [a, b] => (relative(*b, *a), 0.0),
        _ => (0.0, 0.0),
    }
}

impl FeatureSnapshot {
    /// Builds the snapshot for `symbol` over its last `window` finished
    /// candles. `None` until the symbol has received a tick.
    pub fn build(registry: &BufferRegistry, symbol: &str, window: usize) -> Option<Self> {
        let buffer = registry.buffer(symbol)?;
        let last = buffer.last_tick()?;
        let config = SymbolConfiguration::for_symbol(symbol);

        let candles: Vec<Candle> = buffer.recent_candles(window);
        let (velocity, acceleration) = motion(&buffer.recent_prices(3));
        let indicators = compute_indicators(&candles, &config);
        let regime = classify(&indicators);

        let hour = DateTime::from_timestamp(last.epoch, 0)
            .map(|t| t.hour())
            .unwrap_or(0);

        Some(FeatureSnapshot {
            symbol: symbol.to_string(),
            epoch: last.epoch,
            price: last.price,
            velocity,
            acceleration,
            indicators,
            regime,
            spike: registry.spike_tracker(symbol).map(|t| t.analysis()),
            session_strength: session_strength(hour),
        })
    }
}
