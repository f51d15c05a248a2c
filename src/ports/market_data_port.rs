//! Market data source port.

use crate::domain::candle::Candle;
use crate::domain::error::SynthError;
use crate::domain::tick::Tick;

/// One historical candle request. The id correlates the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoricalRequest {
    pub request_id: u64,
    pub symbol: String,
    pub start_epoch: i64,
    pub end_epoch: i64,
    pub granularity: u32,
}

pub trait MarketDataPort {
    fn connect(&mut self) -> Result<(), SynthError> {
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), SynthError> {
        Ok(())
    }

    /// Ticks for `symbol` in delivery order.
    fn subscribe(&self, symbol: &str) -> Result<Box<dyn Iterator<Item = Tick> + '_>, SynthError>;

    /// Candles in `[start_epoch, end_epoch]` at `granularity` seconds.
    /// Fails with [`SynthError::MarketData`] on transport errors or timeout.
    fn fetch_historical(&self, request: &HistoricalRequest) -> Result<Vec<Candle>, SynthError>;
}
