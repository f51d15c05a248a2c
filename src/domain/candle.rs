//! OHLC candle representation and tick aggregation.

use serde::Serialize;

use super::tick::Tick;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candle {
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Unix epoch seconds of the interval start.
    pub epoch: i64,
    pub volume: Option<f64>,
}

impl Candle {
    /// A candle opened by a single tick.
    pub fn from_tick(tick: &Tick, interval_secs: i64) -> Self {
        Candle {
            symbol: tick.symbol.clone(),
            open: tick.price,
            high: tick.price,
            low: tick.price,
            close: tick.price,
            epoch: bucket_start(tick.epoch, interval_secs),
            volume: None,
        }
    }

    /// Folds another tick of the same bucket into this candle.
    pub fn absorb(&mut self, price: f64) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
    }

    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}

/// Start of the fixed-width bucket containing `epoch`.
pub fn bucket_start(epoch: i64, interval_secs: i64) -> i64 {
    if interval_secs <= 0 {
        return epoch;
    }
    epoch - epoch.rem_euclid(interval_secs)
}

/// Groups ticks into fixed-width buckets: first price opens, last closes,
/// extremes give high/low. Buckets without ticks produce no candle.
pub fn aggregate_ticks(ticks: &[Tick], interval_secs: i64) -> Vec<Candle> {
    let mut candles: Vec<Candle> = Vec::new();

    for tick in ticks {
        let start = bucket_start(tick.epoch, interval_secs);
        match candles.last_mut() {
            Some(current) if current.epoch == start => current.absorb(tick.price),
            _ => candles.push(Candle::from_tick(tick, interval_secs)),
        }
    }

    candles
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_candle() -> Candle {
        Candle {
            symbol: "R_100".into(),
            open: 100.0,
            high: 110.0,
            low: 90.0,
            close: 105.0,
            epoch: 1_700_000_000,
            volume: None,
        }
    }

    fn tick(epoch: i64, price: f64) -> Tick {
        Tick::new("R_100", price, epoch as u64, epoch, 0.01)
    }

    #[test]
    fn true_range_hl_dominates() {
        assert!((sample_candle().true_range(100.0) - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn true_range_gap_up() {
        // high-low=20, |110-70|=40, |90-70|=20 → 40
        assert!((sample_candle().true_range(70.0) - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn true_range_gap_down() {
        assert!((sample_candle().true_range(130.0) - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bucket_start_aligns_to_interval() {
        assert_eq!(bucket_start(125, 60), 120);
        assert_eq!(bucket_start(120, 60), 120);
        assert_eq!(bucket_start(119, 60), 60);
    }

    #[test]
    fn aggregate_groups_by_bucket() {
        let ticks = vec![
            tick(60, 10.0),
            tick(70, 12.0),
            tick(80, 9.0),
            tick(119, 11.0),
            tick(120, 11.5),
            tick(150, 11.0),
        ];
        let candles = aggregate_ticks(&ticks, 60);

        assert_eq!(candles.len(), 2);
        let first = &candles[0];
        assert_eq!(first.epoch, 60);
        assert_eq!(first.open, 10.0);
        assert_eq!(first.high, 12.0);
        assert_eq!(first.low, 9.0);
        assert_eq!(first.close, 11.0);
        assert_eq!(candles[1].epoch, 120);
        assert_eq!(candles[1].close, 11.0);
    }

    #[test]
    fn aggregate_does_not_fill_gaps() {
        let ticks = vec![tick(0, 1.0), tick(600, 2.0)];
        let candles = aggregate_ticks(&ticks, 60);
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[1].epoch, 600);
    }
}
