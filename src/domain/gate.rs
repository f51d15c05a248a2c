//! Sequential quality gate applied to oracle signals.
//!
//! Gates run in a fixed order and stop at the first failure:
//!
//! 1. confidence >= 0.72
//! 2. risk/reward >= 2.5
//! 3. at least 4 of the 5 strength factors above their own threshold
//! 4. timeframe confluence is not Weak
//! 5. structure quality is not Low
//! 6. declared max risk per trade <= 0.015
//! 7. spike-prone symbols only: confidence >= 0.75 and, when reported,
//!    spike probability >= 0.7
//!
//! A rejection is an outcome, not an error. Each one is counted per symbol
//! and per gate.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use super::prediction::{factor, Prediction, StructureQuality, TimeframeConfluence};
use super::symbol::SymbolClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Gate {
    Confidence,
    RiskReward,
    StrengthFactors,
    TimeframeConfluence,
    StructureQuality,
    MaxRisk,
    SpikeProne,
}

impl Gate {
    pub const ORDER: [Gate; 7] = [
        Gate::Confidence,
        Gate::RiskReward,
        Gate::StrengthFactors,
        Gate::TimeframeConfluence,
        Gate::StructureQuality,
        Gate::MaxRisk,
        Gate::SpikeProne,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Gate::Confidence => "confidence",
            Gate::RiskReward => "risk_reward",
            Gate::StrengthFactors => "strength_factors",
            Gate::TimeframeConfluence => "timeframe_confluence",
            Gate::StructureQuality => "structure_quality",
            Gate::MaxRisk => "max_risk",
            Gate::SpikeProne => "spike_prone",
        }
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strength factors and the value each must exceed.
pub const STRENGTH_FACTORS: [(&str, f64); 5] = [
    (factor::TECHNICAL_STRENGTH, 0.7),
    (factor::MOMENTUM_ALIGNMENT, 0.65),
    (factor::VOLATILITY_SUITABILITY, 0.6),
    (factor::PATTERN_CLARITY, 0.7),
    (factor::SESSION_QUALITY, 0.6),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateThresholds {
    pub min_confidence: f64,
    pub min_risk_reward: f64,
    pub min_strong_factors: usize,
    pub max_risk_per_trade: f64,
    pub spike_min_confidence: f64,
    pub spike_min_probability: f64,
}

impl Default for GateThresholds {
    fn default() -> Self {
        GateThresholds {
            min_confidence: 0.72,
            min_risk_reward: 2.5,
            min_strong_factors: 4,
            max_risk_per_trade: 0.015,
            spike_min_confidence: 0.75,
            spike_min_probability: 0.7,
        }
    }
}

/// Facts about the caller that the gates need besides the prediction.
#[derive(Debug, Clone, Copy)]
pub struct GateContext<'a> {
    pub symbol: &'a str,
    pub max_risk_per_trade: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectionReason {
    pub gate: Gate,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    Approved,
    Rejected(RejectionReason),
}

impl GateDecision {
    pub fn is_approved(&self) -> bool {
        matches!(self, GateDecision::Approved)
    }
}

pub fn count_strong_factors(prediction: &Prediction) -> usize {
    STRENGTH_FACTORS
        .iter()
        .filter(|(name, threshold)| {
            prediction
                .factor(name)
                .is_some_and(|value| value > *threshold)
        })
        .count()
}

#[derive(Debug, Clone, Default)]
pub struct QualityGateFilter {
    thresholds: GateThresholds,
    evaluations: [u64; 7],
    rejections: BTreeMap<String, BTreeMap<Gate, u64>>,
}

impl QualityGateFilter {
    pub fn new(thresholds: GateThresholds) -> Self {
        QualityGateFilter {
            thresholds,
            ..Default::default()
        }
    }

    pub fn evaluate(&mut self, prediction: &Prediction, ctx: GateContext<'_>) -> GateDecision {
        for gate in Gate::ORDER {
            self.evaluations[gate.index()] += 1;
            if let Err(detail) = self.check(gate, prediction, ctx) {
                debug!(symbol = ctx.symbol, gate = %gate, %detail, "signal rejected");
                *self
                    .rejections
                    .entry(ctx.symbol.to_string())
                    .or_default()
                    .entry(gate)
                    .or_insert(0) += 1;
                return GateDecision::Rejected(RejectionReason { gate, detail });
            }
        }
        GateDecision::Approved
    }

    fn check(&self, gate: Gate, p: &Prediction, ctx: GateContext<'_>) -> Result<(), String> {
        let t = &self.thresholds;
        match gate {
            Gate::Confidence => {
                if p.confidence < t.min_confidence {
                    return Err(format!("confidence {:.3} < {}", p.confidence, t.min_confidence));
                }
            }
            Gate::RiskReward => {
                let rr = p.levels.risk_reward_ratio;
                if rr < t.min_risk_reward {
                    return Err(format!("risk/reward {rr:.2} < {}", t.min_risk_reward));
                }
            }
            Gate::StrengthFactors => {
                let strong = count_strong_factors(p);
                if strong < t.min_strong_factors {
                    return Err(format!(
                        "{strong} of {} strength factors, need {}",
                        STRENGTH_FACTORS.len(),
                        t.min_strong_factors
                    ));
                }
            }
            Gate::TimeframeConfluence => {
                if p.timeframe_confluence == TimeframeConfluence::Weak {
                    return Err("weak timeframe confluence".into());
                }
            }
            Gate::StructureQuality => {
                if p.structure_quality == StructureQuality::Low {
                    return Err("low market structure quality".into());
                }
            }
            Gate::MaxRisk => {
                if ctx.max_risk_per_trade > t.max_risk_per_trade {
                    return Err(format!(
                        "risk per trade {} > {}",
                        ctx.max_risk_per_trade, t.max_risk_per_trade
                    ));
                }
            }
            Gate::SpikeProne => {
                if !SymbolClass::of(ctx.symbol).is_spike_prone() {
                    return Ok(());
                }
                if p.confidence < t.spike_min_confidence {
                    return Err(format!(
                        "spike-prone confidence {:.3} < {}",
                        p.confidence, t.spike_min_confidence
                    ));
                }
                match p.factor(factor::SPIKE_PROBABILITY) {
                    Some(prob) if prob < t.spike_min_probability => {
                        return Err(format!(
                            "spike probability {prob:.3} < {}",
                            t.spike_min_probability
                        ));
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// How many times `gate` has been evaluated.
    pub fn evaluations(&self, gate: Gate) -> u64 {
        self.evaluations[gate.index()]
    }

    pub fn rejections_for(&self, symbol: &str) -> u64 {
        self.rejections
            .get(symbol)
            .map(|by_gate| by_gate.values().sum())
            .unwrap_or(0)
    }

    pub fn rejections_by_gate(&self, symbol: &str, gate: Gate) -> u64 {
        self.rejections
            .get(symbol)
            .and_then(|by_gate| by_gate.get(&gate).copied())
            .unwrap_or(0)
    }

    pub fn total_rejections(&self) -> u64 {
        self.rejections
            .values()
            .flat_map(|by_gate| by_gate.values())
            .sum()
    }
}
