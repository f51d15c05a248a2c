//! Historical data loading and pre-run integrity checks.
//!
//! The loader walks the timeframe's fallback granularities, retrying
//! transient fetch failures with a fixed pause between requests, and stops
//! at the first granularity that yields valid records. Nothing is ever
//! synthesized: running out of granularities is [`SynthError::DataUnavailable`].

use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::candle::Candle;
use super::error::SynthError;
use super::tick::Tick;
use super::timeframe::Timeframe;
use crate::ports::market_data_port::{HistoricalRequest, MarketDataPort};

/// 2015-01-01T00:00:00Z. Earlier timestamps are treated as corrupt.
pub const SANITY_EPOCH_FLOOR: i64 = 1_420_070_400;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries per granularity, not counting the first attempt.
    pub max_retries: u32,
    /// Pause before every request after the first.
    pub pace: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_retries: 3,
            pace: Duration::from_millis(500),
        }
    }
}

impl RetryConfig {
    pub fn no_retry() -> Self {
        RetryConfig {
            max_retries: 0,
            pace: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalData {
    pub symbol: String,
    /// Granularity the records were actually served at.
    pub granularity: u32,
    pub candles: Vec<Candle>,
}

/// Checks ticks before a run: epoch floor, non-decreasing epochs, finite
/// positive prices.
pub fn validate_ticks(ticks: &[Tick]) -> Result<(), SynthError> {
    let mut prev_epoch: Option<i64> = None;
    for (index, tick) in ticks.iter().enumerate() {
        if tick.epoch < SANITY_EPOCH_FLOOR {
            return Err(SynthError::DataIntegrity {
                index,
                reason: format!("epoch {} is before 2015-01-01", tick.epoch),
            });
        }
        if !(tick.price.is_finite() && tick.price > 0.0) {
            return Err(SynthError::DataIntegrity {
                index,
                reason: format!("non-positive price {}", tick.price),
            });
        }
        match prev_epoch {
            Some(prev) if tick.epoch < prev => {
                return Err(SynthError::DataIntegrity {
                    index,
                    reason: format!("epoch {} after {}", tick.epoch, prev),
                });
            }
            _ => {}
        }
        prev_epoch = Some(tick.epoch);
    }
    Ok(())
}

fn is_valid(candle: &Candle, start_epoch: i64, end_epoch: i64) -> bool {
    let prices = [candle.open, candle.high, candle.low, candle.close];
    prices.iter().all(|p| p.is_finite() && *p > 0.0)
        && candle.high >= candle.low
        && candle.epoch >= start_epoch.max(SANITY_EPOCH_FLOOR)
        && candle.epoch <= end_epoch
}

/// Keeps valid candles in arrival order, dropping any that do not move
/// strictly forward in time.
pub fn filter_valid(candles: Vec<Candle>, start_epoch: i64, end_epoch: i64) -> Vec<Candle> {
    let mut last_epoch: Option<i64> = None;
    candles
        .into_iter()
        .filter(|c| {
            if !is_valid(c, start_epoch, end_epoch) {
                return false;
            }
            if last_epoch.is_some_and(|last| c.epoch <= last) {
                return false;
            }
            last_epoch = Some(c.epoch);
            true
        })
        .collect()
}

/// One replay tick per candle: the close price at the candle's epoch.
pub fn candles_to_ticks(candles: &[Candle], pip_size: f64) -> Vec<Tick> {
    candles
        .iter()
        .enumerate()
        .map(|(i, c)| Tick::new(&c.symbol, c.close, i as u64, c.epoch, pip_size))
        .collect()
}

pub struct HistoryLoader<'a> {
    port: &'a dyn MarketDataPort,
    retry: RetryConfig,
    next_request_id: u64,
}

impl<'a> HistoryLoader<'a> {
    pub fn new(port: &'a dyn MarketDataPort, retry: RetryConfig) -> Self {
        HistoryLoader {
            port,
            retry,
            next_request_id: 1,
        }
    }

    pub fn load(
        &mut self,
        symbol: &str,
        timeframe: Timeframe,
        start_epoch: i64,
        end_epoch: i64,
    ) -> Result<HistoricalData, SynthError> {
        let granularities = timeframe.fallback_granularities();

        for &granularity in &granularities {
            let Some(candles) = self.fetch_with_retry(symbol, granularity, start_epoch, end_epoch)?
            else {
                continue;
            };
            let valid = filter_valid(candles, start_epoch, end_epoch);
            if valid.is_empty() {
                debug!(symbol, granularity, "no valid records, trying next granularity");
                continue;
            }
            info!(symbol, granularity, records = valid.len(), "historical data loaded");
            return Ok(HistoricalData {
                symbol: symbol.to_string(),
                granularity,
                candles: valid,
            });
        }

        Err(SynthError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: format!("no valid records at any granularity in {granularities:?}"),
        })
    }

    /// `Ok(None)` when every attempt at this granularity failed transiently.
    fn fetch_with_retry(
        &mut self,
        symbol: &str,
        granularity: u32,
        start_epoch: i64,
        end_epoch: i64,
    ) -> Result<Option<Vec<Candle>>, SynthError> {
        for attempt in 0..=self.retry.max_retries {
            if self.next_request_id > 1 && !self.retry.pace.is_zero() {
                thread::sleep(self.retry.pace);
            }
            let request = HistoricalRequest {
                request_id: self.next_request_id,
                symbol: symbol.to_string(),
                start_epoch,
                end_epoch,
                granularity,
            };
            self.next_request_id += 1;

            match self.port.fetch_historical(&request) {
                Ok(candles) => return Ok(Some(candles)),
                Err(SynthError::MarketData { reason }) => {
                    warn!(
                        symbol,
                        granularity,
                        attempt,
                        request_id = request.request_id,
                        %reason,
                        "historical fetch failed"
                    );
                }
                Err(other) => return Err(other),
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    const START: i64 = 1_704_067_200;

    fn candle(epoch: i64, close: f64) -> Candle {
        Candle {
            symbol: "R_100".into(),
            open: close,
            high: close,
            low: close,
            close,
            epoch,
            volume: None,
        }
    }

    fn tick(epoch: i64, price: f64) -> Tick {
        Tick::new("R_100", price, 0, epoch, 0.01)
    }

    /// Serves scripted responses per granularity and records every request.
    struct ScriptedPort {
        responses: RefCell<Vec<(u32, Result<Vec<Candle>, SynthError>)>>,
        requests: RefCell<Vec<HistoricalRequest>>,
    }

    impl ScriptedPort {
        fn new(responses: Vec<(u32, Result<Vec<Candle>, SynthError>)>) -> Self {
            ScriptedPort {
                responses: RefCell::new(responses),
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl MarketDataPort for ScriptedPort {
        fn subscribe(
            &self,
            _symbol: &str,
        ) -> Result<Box<dyn Iterator<Item = Tick> + '_>, SynthError> {
            Ok(Box::new(std::iter::empty()))
        }

        fn fetch_historical(&self, request: &HistoricalRequest) -> Result<Vec<Candle>, SynthError> {
            self.requests.borrow_mut().push(request.clone());
            let mut responses = self.responses.borrow_mut();
            match responses.iter().position(|(g, _)| *g == request.granularity) {
                Some(i) => responses.remove(i).1,
                None => Ok(Vec::new()),
            }
        }
    }

    fn transient() -> SynthError {
        SynthError::MarketData {
            reason: "timeout".into(),
        }
    }

    #[test]
    fn validate_ticks_accepts_clean_data() {
        let ticks = vec![tick(START, 1.0), tick(START, 1.1), tick(START + 1, 1.2)];
        assert!(validate_ticks(&ticks).is_ok());
        assert!(validate_ticks(&[]).is_ok());
    }

    #[test]
    fn validate_ticks_rejects_old_epoch() {
        let err = validate_ticks(&[tick(1_000, 1.0)]).unwrap_err();
        assert!(matches!(err, SynthError::DataIntegrity { index: 0, .. }));
    }

    #[test]
    fn validate_ticks_rejects_backwards_time() {
        let ticks = vec![tick(START + 10, 1.0), tick(START + 5, 1.0)];
        let err = validate_ticks(&ticks).unwrap_err();
        assert!(matches!(err, SynthError::DataIntegrity { index: 1, .. }));
    }

    #[test]
    fn validate_ticks_rejects_bad_price() {
        assert!(validate_ticks(&[tick(START, 0.0)]).is_err());
        assert!(validate_ticks(&[tick(START, f64::NAN)]).is_err());
    }

    #[test]
    fn filter_drops_invalid_and_out_of_order() {
        let candles = vec![
            candle(START, 1.0),
            candle(START + 60, -1.0),
            candle(START + 120, 1.2),
            candle(START + 60, 1.1),
            candle(START + 120, 1.3),
            candle(START + 180, 1.4),
        ];
        let kept = filter_valid(candles, START, START + 3600);
        let epochs: Vec<i64> = kept.iter().map(|c| c.epoch).collect();
        assert_eq!(epochs, vec![START, START + 120, START + 180]);
    }

    #[test]
    fn filter_respects_range() {
        let candles = vec![candle(START - 60, 1.0), candle(START, 1.0), candle(START + 60, 1.0)];
        assert_eq!(filter_valid(candles, START, START).len(), 1);
    }

    #[test]
    fn loads_first_granularity_with_data() {
        let port = ScriptedPort::new(vec![(60, Ok(vec![candle(START, 1.0), candle(START + 60, 1.1)]))]);
        let mut loader = HistoryLoader::new(&port, RetryConfig::no_retry());
        let data = loader.load("R_100", Timeframe::M1, START, START + 3600).unwrap();

        assert_eq!(data.granularity, 60);
        assert_eq!(data.candles.len(), 2);
        let ticks = candles_to_ticks(&data.candles, 0.01);
        assert_eq!(ticks[1].price, 1.1);
        assert_eq!(ticks[1].epoch, START + 60);
        assert_eq!(port.requests.borrow().len(), 1);
    }

    #[test]
    fn retries_then_falls_back() {
        let port = ScriptedPort::new(vec![
            (60, Err(transient())),
            (60, Err(transient())),
            (300, Ok(vec![candle(START, 1.0)])),
        ]);
        let retry = RetryConfig {
            max_retries: 1,
            pace: Duration::ZERO,
        };
        let mut loader = HistoryLoader::new(&port, retry);
        let data = loader.load("R_100", Timeframe::M1, START, START + 3600).unwrap();

        assert_eq!(data.granularity, 300);
        let requests = port.requests.borrow();
        let grans: Vec<u32> = requests.iter().map(|r| r.granularity).collect();
        assert_eq!(grans, vec![60, 60, 300]);
        let ids: Vec<u64> = requests.iter().map(|r| r.request_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn exhausted_fallbacks_are_unavailable() {
        let port = ScriptedPort::new(vec![(60, Ok(vec![candle(START, -5.0)]))]);
        let mut loader = HistoryLoader::new(&port, RetryConfig::no_retry());
        let err = loader.load("R_100", Timeframe::M1, START, START + 3600).unwrap_err();
        assert!(matches!(err, SynthError::DataUnavailable { .. }));
        assert_eq!(
            port.requests.borrow().len(),
            Timeframe::M1.fallback_granularities().len()
        );
    }

    #[test]
    fn non_transient_error_propagates() {
        let port = ScriptedPort::new(vec![(
            60,
            Err(SynthError::DataIntegrity {
                index: 0,
                reason: "corrupt".into(),
            }),
        )]);
        let mut loader = HistoryLoader::new(&port, RetryConfig::default());
        let err = loader.load("R_100", Timeframe::M1, START, START + 3600).unwrap_err();
        assert!(matches!(err, SynthError::DataIntegrity { .. }));
    }
}
