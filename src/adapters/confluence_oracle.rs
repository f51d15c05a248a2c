//! Offline prediction oracle derived from the feature snapshot alone.
//!
//! Direction follows the trend state (MACD histogram sign when sideways),
//! confidence is the regime confluence score nudged by trend strength, and
//! levels are placed from ATR scaled by the symbol's volatility multiplier.

use std::collections::BTreeMap;

use crate::domain::error::SynthError;
use crate::domain::prediction::{
    factor, Direction, OracleRequest, Prediction, StructureQuality, TimeframeConfluence,
    TradingLevels,
};
use crate::domain::regime::{Regime, TrendState, VolatilityState};
use crate::domain::symbol::SymbolConfiguration;
use crate::ports::oracle_port::PredictionOracle;

/// Stop distance never drops below this fraction of price.
const MIN_STOP_FRACTION: f64 = 0.001;

#[derive(Debug, Clone, Default)]
pub struct ConfluenceOracle;

impl ConfluenceOracle {
    pub fn new() -> Self {
        ConfluenceOracle
    }
}

fn direction_of(trend: TrendState, histogram: f64) -> Direction {
    match trend {
        TrendState::StrongUp | TrendState::WeakUp => Direction::Up,
        TrendState::StrongDown | TrendState::WeakDown => Direction::Down,
        TrendState::Sideways if histogram < 0.0 => Direction::Down,
        TrendState::Sideways => Direction::Up,
    }
}

fn confidence_of(confluence: f64, trend: TrendState) -> f64 {
    let adjust = match trend {
        TrendState::StrongUp | TrendState::StrongDown => 0.1,
        TrendState::Sideways => -0.1,
        _ => 0.0,
    };
    (confluence + adjust).clamp(0.0, 1.0)
}

impl PredictionOracle for ConfluenceOracle {
    fn predict(&self, request: &OracleRequest) -> Result<Prediction, SynthError> {
        let features = &request.features;
        let price = request.current_price;
        if !(price.is_finite() && price > 0.0) {
            return Err(SynthError::Oracle {
                reason: format!("unusable price {price}"),
            });
        }

        let config = SymbolConfiguration::for_symbol(&request.symbol);
        let regime = &features.regime;
        let ind = &features.indicators;

        let direction = direction_of(regime.trend, ind.macd.histogram);
        let confidence = confidence_of(regime.confluence, regime.trend);

        let stop_distance = (ind.atr.atr * config.volatility_multiplier).max(price * MIN_STOP_FRACTION);
        let risk_reward = 1.0 + 2.0 * regime.confluence;
        let sign = direction.sign();
        let levels = TradingLevels {
            entry: price,
            stop_loss: price - sign * stop_distance,
            take_profit: price + sign * stop_distance * risk_reward,
            risk_reward_ratio: risk_reward,
        };

        let stoch = ind.stoch_rsi / 100.0;
        let momentum_alignment = match direction {
            Direction::Up => stoch,
            Direction::Down => 1.0 - stoch,
        };
        let volatility_suitability = match regime.volatility {
            VolatilityState::Normal => 0.9,
            VolatilityState::High => 0.7,
            VolatilityState::Low => 0.5,
            VolatilityState::Extreme => 0.3,
        };
        let pattern_clarity = match regime.regime {
            Regime::Trending => 0.9,
            Regime::Breakout => 0.75,
            Regime::Reversal => 0.6,
            Regime::Ranging => 0.4,
        };

        let mut factors = BTreeMap::from([
            (factor::TECHNICAL_STRENGTH.to_string(), regime.confluence),
            (factor::MOMENTUM_ALIGNMENT.to_string(), momentum_alignment),
            (factor::VOLATILITY_SUITABILITY.to_string(), volatility_suitability),
            (factor::PATTERN_CLARITY.to_string(), pattern_clarity),
            (factor::SESSION_QUALITY.to_string(), features.session_strength),
        ]);
        if let Some(spike) = &features.spike {
            factors.insert(factor::SPIKE_PROBABILITY.to_string(), spike.probability);
        }

        let timeframe_confluence = if regime.confluence >= 0.8 {
            TimeframeConfluence::Strong
        } else if regime.confluence >= 0.6 {
            TimeframeConfluence::Moderate
        } else {
            TimeframeConfluence::Weak
        };
        let structure_quality = match regime.regime {
            Regime::Trending => StructureQuality::High,
            Regime::Breakout | Regime::Reversal => StructureQuality::Medium,
            Regime::Ranging => StructureQuality::Low,
        };

        Ok(Prediction {
            direction,
            confidence,
            levels,
            factors,
            timeframe_confluence,
            structure_quality,
        })
    }
}
