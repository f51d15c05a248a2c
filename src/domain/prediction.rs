//! Records exchanged with a prediction oracle.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use super::candle::Candle;
use super::error::SynthError;
use super::features::FeatureSnapshot;
use super::timeframe::Timeframe;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// +1 for Up, -1 for Down.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Up => 1.0,
            Direction::Down => -1.0,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "UP"),
            Direction::Down => write!(f, "DOWN"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TimeframeConfluence {
    Strong,
    Moderate,
    Weak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StructureQuality {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TradingLevels {
    pub entry: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub risk_reward_ratio: f64,
}

/// Named strength factors scored by the oracle.
pub mod factor {
    pub const TECHNICAL_STRENGTH: &str = "technical_strength";
    pub const MOMENTUM_ALIGNMENT: &str = "momentum_alignment";
    pub const VOLATILITY_SUITABILITY: &str = "volatility_suitability";
    pub const PATTERN_CLARITY: &str = "pattern_clarity";
    pub const SESSION_QUALITY: &str = "session_quality";
    /// Only meaningful for spike-prone symbols.
    pub const SPIKE_PROBABILITY: &str = "spike_probability";
}

/// Oracle output for one signal request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub direction: Direction,
    pub confidence: f64,
    pub levels: TradingLevels,
    /// Ordered for deterministic iteration and serialization.
    pub factors: BTreeMap<String, f64>,
    pub timeframe_confluence: TimeframeConfluence,
    pub structure_quality: StructureQuality,
}

impl Prediction {
    pub fn factor(&self, name: &str) -> Option<f64> {
        self.factors.get(name).copied()
    }

    /// Rejects malformed oracle output instead of letting it reach a position.
    pub fn validate(&self) -> Result<(), SynthError> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(SynthError::Oracle {
                reason: format!("confidence {} outside [0, 1]", self.confidence),
            });
        }
        let levels = [
            self.levels.entry,
            self.levels.stop_loss,
            self.levels.take_profit,
            self.levels.risk_reward_ratio,
        ];
        if levels.iter().any(|v| !v.is_finite()) {
            return Err(SynthError::Oracle {
                reason: "non-finite trading level".into(),
            });
        }
        Ok(())
    }
}

/// Everything the oracle is given for one decision.
#[derive(Debug, Clone, Serialize)]
pub struct OracleRequest {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub current_price: f64,
    pub features: FeatureSnapshot,
    pub candles: Vec<Candle>,
}
