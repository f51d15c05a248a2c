//! Candle timeframes and the lookups derived from them.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use super::error::SynthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
}

/// Candle granularities the history loader may fall back to, finest first.
const GRANULARITY_LADDER: [u32; 7] = [60, 300, 900, 1800, 3600, 14400, 86400];

impl Timeframe {
    pub const ALL: [Timeframe; 7] = [
        Timeframe::M1,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::H4,
        Timeframe::D1,
    ];

    /// Width of one candle in seconds.
    pub fn granularity_secs(self) -> u32 {
        match self {
            Timeframe::M1 => 60,
            Timeframe::M5 => 300,
            Timeframe::M15 => 900,
            Timeframe::M30 => 1800,
            Timeframe::H1 => 3600,
            Timeframe::H4 => 14400,
            Timeframe::D1 => 86400,
        }
    }

    /// Number of replayed ticks between two signal checks.
    pub fn signal_tick_interval(self) -> u64 {
        match self {
            Timeframe::M1 => 60,
            Timeframe::M5 => 300,
            Timeframe::M15 => 900,
            Timeframe::M30 => 1800,
            Timeframe::H1 => 3600,
            Timeframe::H4 => 14400,
            Timeframe::D1 => 86400,
        }
    }

    /// Longest a simulated position may stay open, in seconds.
    pub fn max_holding_secs(self) -> i64 {
        match self {
            Timeframe::M1 => 30 * 60,
            Timeframe::M5 => 2 * 3600,
            Timeframe::M15 => 6 * 3600,
            Timeframe::M30 => 12 * 3600,
            Timeframe::H1 => 24 * 3600,
            Timeframe::H4 => 3 * 86400,
            Timeframe::D1 => 10 * 86400,
        }
    }

    /// The timeframe's own granularity first, then the rest of the ladder
    /// from finest to coarsest.
    pub fn fallback_granularities(self) -> Vec<u32> {
        let own = self.granularity_secs();
        std::iter::once(own)
            .chain(GRANULARITY_LADDER.iter().copied().filter(|&g| g != own))
            .collect()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1m" | "m1" => Ok(Timeframe::M1),
            "5m" | "m5" => Ok(Timeframe::M5),
            "15m" | "m15" => Ok(Timeframe::M15),
            "30m" | "m30" => Ok(Timeframe::M30),
            "1h" | "h1" => Ok(Timeframe::H1),
            "4h" | "h4" => Ok(Timeframe::H4),
            "1d" | "d1" => Ok(Timeframe::D1),
            other => Err(SynthError::invalid(
                "backtest",
                "timeframe",
                format!("unknown timeframe '{other}' (expected 1m, 5m, 15m, 30m, 1h, 4h or 1d)"),
            )),
        }
    }
}
