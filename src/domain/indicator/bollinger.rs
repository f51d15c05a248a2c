//! Bollinger Bands.
//!
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! StdDev is the population standard deviation (divides by N, not N-1).
//! Width is (upper - lower) / middle. The bands squeeze when the current
//! width drops below 0.8 × the mean width of the trailing n windows.
//!
//! Neutral default with fewer than n closes: all bands at the last close,
//! position 0.5, no squeeze.

use serde::Serialize;

use super::stats::{mean, population_stddev};
use crate::domain::candle::Candle;

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_MULT: f64 = 2.0;
pub const SQUEEZE_RATIO: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BollingerOutput {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    pub width: f64,
    /// (price - lower) / (upper - lower); 0.5 when the bands collapse.
    pub position: f64,
    pub squeeze: bool,
}

impl BollingerOutput {
    fn neutral(price: f64) -> Self {
        BollingerOutput {
            upper: price,
            middle: price,
            lower: price,
            width: 0.0,
            position: 0.5,
            squeeze: false,
        }
    }
}

/// (upper, middle, lower) of the window `closes[end + 1 - period..=end]`.
fn bands_at(closes: &[f64], end: usize, period: usize, mult: f64) -> (f64, f64, f64) {
    let window = &closes[end + 1 - period..=end];
    let middle = mean(window);
    let sd = population_stddev(window);
    (middle + mult * sd, middle, middle - mult * sd)
}

fn relative_width(upper: f64, middle: f64, lower: f64) -> f64 {
    if middle != 0.0 {
        (upper - lower) / middle
    } else {
        upper - lower
    }
}

pub fn calculate_bollinger(candles: &[Candle], period: usize, mult: f64) -> BollingerOutput {
    let price = candles.last().map(|c| c.close).unwrap_or(0.0);
    if period == 0 || candles.len() < period {
        return BollingerOutput::neutral(price);
    }

    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let last = closes.len() - 1;
    let (upper, middle, lower) = bands_at(&closes, last, period, mult);
    let width = relative_width(upper, middle, lower);

    let band = upper - lower;
    let position = if band == 0.0 {
        0.5
    } else {
        (price - lower) / band
    };

    // Trailing widths need `period` complete windows.
    let squeeze = if closes.len() >= 2 * period - 1 {
        let widths: Vec<f64> = (last + 1 - period..=last)
            .map(|end| {
                let (u, m, l) = bands_at(&closes, end, period, mult);
                relative_width(u, m, l)
            })
            .collect();
        let avg = mean(&widths);
        avg > 0.0 && width < SQUEEZE_RATIO * avg
    } else {
        false
    };

    BollingerOutput {
        upper,
        middle,
        lower,
        width,
        position,
        squeeze,
    }
}
