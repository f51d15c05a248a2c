//! Market regime classification from an [`IndicatorSet`].
//!
//! A fixed rule table; the same indicators always produce the same labels.

use serde::Serialize;

use super::indicator::IndicatorSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VolatilityState {
    Low,
    Normal,
    High,
    Extreme,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrendState {
    StrongUp,
    WeakUp,
    Sideways,
    WeakDown,
    StrongDown,
}

impl TrendState {
    pub fn is_strong(self) -> bool {
        matches!(self, TrendState::StrongUp | TrendState::StrongDown)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MomentumState {
    Accelerating,
    Steady,
    Decelerating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Regime {
    Breakout,
    Reversal,
    Trending,
    Ranging,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegimeState {
    pub volatility: VolatilityState,
    pub trend: TrendState,
    pub momentum: MomentumState,
    pub regime: Regime,
    /// Weighted agreement of trend, momentum, volatility and divergence, in [0, 1].
    pub confluence: f64,
}

/// Bands on normalized ATR (percent of price).
pub fn classify_volatility(normalized_atr: f64) -> VolatilityState {
    if normalized_atr < 0.5 {
        VolatilityState::Low
    } else if normalized_atr < 1.0 {
        VolatilityState::Normal
    } else if normalized_atr < 2.0 {
        VolatilityState::High
    } else {
        VolatilityState::Extreme
    }
}

/// RSI thresholds confirmed by the MACD histogram sign.
pub fn classify_trend(rsi: f64, histogram: f64) -> TrendState {
    if rsi >= 60.0 && histogram > 0.0 {
        TrendState::StrongUp
    } else if rsi <= 40.0 && histogram < 0.0 {
        TrendState::StrongDown
    } else if rsi > 55.0 || (rsi > 50.0 && histogram > 0.0) {
        TrendState::WeakUp
    } else if rsi < 45.0 || (rsi < 50.0 && histogram < 0.0) {
        TrendState::WeakDown
    } else {
        TrendState::Sideways
    }
}

/// Stochastic RSI extremity: outer bands accelerate, the middle decelerates.
pub fn classify_momentum(stoch_rsi: f64) -> MomentumState {
    if stoch_rsi >= 80.0 || stoch_rsi <= 20.0 {
        MomentumState::Accelerating
    } else if stoch_rsi >= 60.0 || stoch_rsi <= 40.0 {
        MomentumState::Steady
    } else {
        MomentumState::Decelerating
    }
}

pub fn confluence_score(
    trend: TrendState,
    momentum: MomentumState,
    volatility: VolatilityState,
    divergence_free: bool,
) -> f64 {
    let trend_weight: f64 = if trend == TrendState::Sideways { 0.1 } else { 0.3 };
    let momentum_weight = match momentum {
        MomentumState::Accelerating => 0.3,
        MomentumState::Steady => 0.2,
        MomentumState::Decelerating => 0.1,
    };
    let volatility_weight = if volatility == VolatilityState::Normal {
        0.2
    } else {
        0.1
    };
    let divergence_bonus = if divergence_free { 0.2 } else { 0.0 };

    (trend_weight + momentum_weight + volatility_weight + divergence_bonus).min(1.0)
}

pub fn classify(indicators: &IndicatorSet) -> RegimeState {
    let volatility = classify_volatility(indicators.atr.normalized);
    let trend = classify_trend(indicators.rsi, indicators.macd.histogram);
    let momentum = classify_momentum(indicators.stoch_rsi);

    let divergence_free =
        indicators.macd.divergence.is_neutral() && indicators.rsi_divergence.is_neutral();

    let regime = if indicators.bollinger.squeeze {
        Regime::Breakout
    } else if !divergence_free {
        Regime::Reversal
    } else if trend.is_strong() {
        Regime::Trending
    } else {
        Regime::Ranging
    };

    RegimeState {
        volatility,
        trend,
        momentum,
        regime,
        confluence: confluence_score(trend, momentum, volatility, divergence_free),
    }
}
