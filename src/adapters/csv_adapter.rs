//! CSV file market data adapter.
//!
//! Candles live in `<SYMBOL>_<granularity>.csv` with columns
//! `epoch,open,high,low,close[,volume]`; ticks for replay live in
//! `<SYMBOL>_ticks.csv` with columns `epoch,price`. Both carry a header row.

use crate::domain::candle::Candle;
use crate::domain::error::SynthError;
use crate::domain::symbol::SymbolConfiguration;
use crate::domain::tick::Tick;
use crate::ports::market_data_port::{HistoricalRequest, MarketDataPort};
use csv::StringRecord;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

pub struct CsvAdapter {
    base_path: PathBuf,
}

fn field<T: FromStr>(record: &StringRecord, index: usize, name: &str) -> Result<T, SynthError>
where
    T::Err: std::fmt::Display,
{
    record
        .get(index)
        .ok_or_else(|| SynthError::MarketData {
            reason: format!("missing {name} column"),
        })?
        .trim()
        .parse()
        .map_err(|e| SynthError::MarketData {
            reason: format!("invalid {name} value: {e}"),
        })
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn candle_path(&self, symbol: &str, granularity: u32) -> PathBuf {
        self.base_path.join(format!("{symbol}_{granularity}.csv"))
    }

    fn tick_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{symbol}_ticks.csv"))
    }

    fn read_records(&self, path: &PathBuf) -> Result<Vec<StringRecord>, SynthError> {
        let content = fs::read_to_string(path).map_err(|e| SynthError::MarketData {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(content.as_bytes());
        rdr.records()
            .map(|r| {
                r.map_err(|e| SynthError::MarketData {
                    reason: format!("CSV parse error: {e}"),
                })
            })
            .collect()
    }

    /// Granularities with a candle file for `symbol`, ascending.
    pub fn available_granularities(&self, symbol: &str) -> Result<Vec<u32>, SynthError> {
        let entries = fs::read_dir(&self.base_path)?;
        let prefix = format!("{symbol}_");
        let mut found = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            let Some(rest) = name.strip_prefix(&prefix) else {
                continue;
            };
            if let Some(Ok(g)) = rest.strip_suffix(".csv").map(str::parse::<u32>) {
                found.push(g);
            }
        }
        found.sort_unstable();
        Ok(found)
    }
}

impl MarketDataPort for CsvAdapter {
    fn connect(&mut self) -> Result<(), SynthError> {
        if self.base_path.is_dir() {
            Ok(())
        } else {
            Err(SynthError::MarketData {
                reason: format!("data directory {} not found", self.base_path.display()),
            })
        }
    }

    fn subscribe(&self, symbol: &str) -> Result<Box<dyn Iterator<Item = Tick> + '_>, SynthError> {
        let pip_size = SymbolConfiguration::for_symbol(symbol).pip_size;
        let records = self.read_records(&self.tick_path(symbol))?;
        let ticks = records
            .iter()
            .enumerate()
            .map(|(i, record)| {
                Ok(Tick::new(
                    symbol,
                    field(record, 1, "price")?,
                    i as u64,
                    field(record, 0, "epoch")?,
                    pip_size,
                ))
            })
            .collect::<Result<Vec<Tick>, SynthError>>()?;
        Ok(Box::new(ticks.into_iter()))
    }

    /// A granularity without a file serves no records.
    fn fetch_historical(&self, request: &HistoricalRequest) -> Result<Vec<Candle>, SynthError> {
        let path = self.candle_path(&request.symbol, request.granularity);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut candles = Vec::new();
        for record in self.read_records(&path)? {
            let epoch: i64 = field(&record, 0, "epoch")?;
            if epoch < request.start_epoch || epoch > request.end_epoch {
                continue;
            }
            let volume = match record.get(5) {
                Some(v) if !v.trim().is_empty() => Some(field(&record, 5, "volume")?),
                _ => None,
            };
            candles.push(Candle {
                symbol: request.symbol.clone(),
                open: field(&record, 1, "open")?,
                high: field(&record, 2, "high")?,
                low: field(&record, 3, "low")?,
                close: field(&record, 4, "close")?,
                epoch,
                volume,
            });
        }
        Ok(candles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const START: i64 = 1_704_067_200;

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let candles = format!(
            "epoch,open,high,low,close,volume\n\
             {},100.0,101.0,99.0,100.5,10\n\
             {},100.5,102.0,100.0,101.5,\n\
             {},101.5,103.0,101.0,102.5,12\n",
            START,
            START + 60,
            START + 120
        );
        fs::write(path.join("R_100_60.csv"), candles).unwrap();
        fs::write(
            path.join("R_100_300.csv"),
            "epoch,open,high,low,close\n",
        )
        .unwrap();
        fs::write(
            path.join("R_100_ticks.csv"),
            format!("epoch,price\n{},100.0\n{},100.2\n", START, START + 1),
        )
        .unwrap();

        (dir, path)
    }

    fn request(granularity: u32, start: i64, end: i64) -> HistoricalRequest {
        HistoricalRequest {
            request_id: 1,
            symbol: "R_100".into(),
            start_epoch: start,
            end_epoch: end,
            granularity,
        }
    }

    #[test]
    fn fetch_historical_returns_candles() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let candles = adapter
            .fetch_historical(&request(60, START, START + 3600))
            .unwrap();
        assert_eq!(candles.len(), 3);
        assert_eq!(candles[0].open, 100.0);
        assert_eq!(candles[0].high, 101.0);
        assert_eq!(candles[0].low, 99.0);
        assert_eq!(candles[0].close, 100.5);
        assert_eq!(candles[0].volume, Some(10.0));
        assert_eq!(candles[1].volume, None);
    }

    #[test]
    fn fetch_historical_filters_by_epoch() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let candles = adapter
            .fetch_historical(&request(60, START + 60, START + 60))
            .unwrap();
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].epoch, START + 60);
    }

    #[test]
    fn missing_granularity_is_empty() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        assert!(adapter
            .fetch_historical(&request(900, START, START + 3600))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn malformed_row_is_market_data_error() {
        let (_dir, path) = setup_test_data();
        fs::write(path.join("R_100_900.csv"), "epoch,open,high,low,close\nabc,1,1,1,1\n").unwrap();
        let adapter = CsvAdapter::new(path);
        let err = adapter
            .fetch_historical(&request(900, START, START + 3600))
            .unwrap_err();
        assert!(matches!(err, SynthError::MarketData { .. }));
    }

    #[test]
    fn subscribe_replays_ticks() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        let ticks: Vec<Tick> = adapter.subscribe("R_100").unwrap().collect();
        assert_eq!(ticks.len(), 2);
        assert_eq!(ticks[1].price, 100.2);
        assert_eq!(ticks[1].sequence, 1);
        assert_eq!(ticks[1].pip_size, 0.01);
    }

    #[test]
    fn connect_requires_data_directory() {
        let (_dir, path) = setup_test_data();
        assert!(CsvAdapter::new(path.clone()).connect().is_ok());
        let err = CsvAdapter::new(path.join("missing")).connect().unwrap_err();
        assert!(matches!(err, SynthError::MarketData { .. }));
    }

    #[test]
    fn lists_available_granularities() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        assert_eq!(adapter.available_granularities("R_100").unwrap(), vec![60, 300]);
        assert!(adapter.available_granularities("BOOM1000").unwrap().is_empty());
    }
}
