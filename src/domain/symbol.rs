//! Per-symbol-class configuration lookup.
//!
//! Every symbol maps to exactly one [`SymbolClass`]; symbols that are not
//! listed fall back to [`SymbolClass::Default`].

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SymbolClass {
    /// R_10, R_25 and their one-second variants.
    VolatilityIndex,
    /// R_50, R_75, R_100 and their one-second variants.
    HighVolatilityIndex,
    /// Upward-spiking index; payload is the expected ticks between spikes.
    Boom(u32),
    /// Downward-spiking index; payload is the expected ticks between spikes.
    Crash(u32),
    StepIndex,
    JumpIndex,
    Default,
}

impl SymbolClass {
    pub fn of(symbol: &str) -> Self {
        match symbol.trim().to_uppercase().as_str() {
            "R_10" | "R_25" | "1HZ10V" | "1HZ25V" => SymbolClass::VolatilityIndex,
            "R_50" | "R_75" | "R_100" | "1HZ50V" | "1HZ75V" | "1HZ100V" => {
                SymbolClass::HighVolatilityIndex
            }
            "BOOM300" | "BOOM300N" => SymbolClass::Boom(300),
            "BOOM500" => SymbolClass::Boom(500),
            "BOOM1000" => SymbolClass::Boom(1000),
            "CRASH300" | "CRASH300N" => SymbolClass::Crash(300),
            "CRASH500" => SymbolClass::Crash(500),
            "CRASH1000" => SymbolClass::Crash(1000),
            "STPRNG" | "STEPINDEX" => SymbolClass::StepIndex,
            "JD10" | "JD25" | "JD50" | "JD75" | "JD100" => SymbolClass::JumpIndex,
            _ => SymbolClass::Default,
        }
    }

    pub fn is_spike_prone(self) -> bool {
        matches!(self, SymbolClass::Boom(_) | SymbolClass::Crash(_))
    }
}

/// Spike detection parameters, only defined for Boom/Crash symbols.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpikeProfile {
    /// Minimum |Δprice/price| on a single tick that counts as a spike.
    pub threshold: f64,
    /// Average number of ticks between spikes.
    pub expected_ticks: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolConfiguration {
    pub class: SymbolClass,
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub atr_period: usize,
    pub bollinger_period: usize,
    pub bollinger_mult: f64,
    pub stochastic_period: usize,
    pub volatility_multiplier: f64,
    pub pip_size: f64,
    pub spike: Option<SpikeProfile>,
}

const SPIKE_THRESHOLD: f64 = 0.03;

impl SymbolConfiguration {
    pub fn for_symbol(symbol: &str) -> Self {
        Self::for_class(SymbolClass::of(symbol))
    }

    pub fn for_class(class: SymbolClass) -> Self {
        let base = Self::default_entry();
        match class {
            SymbolClass::VolatilityIndex => SymbolConfiguration {
                class,
                volatility_multiplier: 0.8,
                ..base
            },
            SymbolClass::HighVolatilityIndex => SymbolConfiguration {
                class,
                rsi_period: 10,
                bollinger_mult: 2.5,
                volatility_multiplier: 1.5,
                ..base
            },
            SymbolClass::Boom(expected_ticks) | SymbolClass::Crash(expected_ticks) => {
                SymbolConfiguration {
                    class,
                    rsi_period: 7,
                    macd_fast: 8,
                    macd_slow: 21,
                    macd_signal: 5,
                    atr_period: 10,
                    bollinger_period: 14,
                    stochastic_period: 10,
                    volatility_multiplier: 2.0,
                    pip_size: 0.001,
                    spike: Some(SpikeProfile {
                        threshold: SPIKE_THRESHOLD,
                        expected_ticks,
                    }),
                    ..base
                }
            }
            SymbolClass::StepIndex => SymbolConfiguration {
                class,
                rsi_period: 21,
                volatility_multiplier: 0.5,
                pip_size: 0.1,
                ..base
            },
            SymbolClass::JumpIndex => SymbolConfiguration {
                class,
                bollinger_mult: 2.5,
                volatility_multiplier: 2.0,
                ..base
            },
            SymbolClass::Default => base,
        }
    }

    /// The single fallback entry used for every unlisted symbol.
    fn default_entry() -> Self {
        SymbolConfiguration {
            class: SymbolClass::Default,
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            atr_period: 14,
            bollinger_period: 20,
            bollinger_mult: 2.0,
            stochastic_period: 14,
            volatility_multiplier: 1.0,
            pip_size: 0.01,
            spike: None,
        }
    }
}
