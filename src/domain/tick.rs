//! Raw price observations.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tick {
    pub symbol: String,
    pub price: f64,
    /// Position of the tick in its source stream.
    pub sequence: u64,
    /// Unix epoch seconds.
    pub epoch: i64,
    pub pip_size: f64,
}

impl Tick {
    pub fn new(symbol: &str, price: f64, sequence: u64, epoch: i64, pip_size: f64) -> Self {
        Tick {
            symbol: symbol.to_string(),
            price,
            sequence,
            epoch,
            pip_size,
        }
    }

    /// Relative move from `prev_price` to this tick.
    pub fn relative_change(&self, prev_price: f64) -> f64 {
        if prev_price == 0.0 {
            return 0.0;
        }
        (self.price - prev_price) / prev_price
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_change_up() {
        let tick = Tick::new("BOOM1000", 106.0, 500, 1_700_000_000, 0.001);
        assert!((tick.relative_change(100.0) - 0.06).abs() < 1e-12);
    }

    #[test]
    fn relative_change_zero_prev() {
        let tick = Tick::new("R_100", 10.0, 1, 1_700_000_000, 0.01);
        assert_eq!(tick.relative_change(0.0), 0.0);
    }
}
