//! Bounded per-symbol tick and candle storage.
//!
//! Each [`SymbolBuffer`] keeps a fixed-capacity FIFO of ticks and of finished
//! candles. Ticks are folded into an in-progress candle of the configured
//! width; the candle is finalized when a tick opens the next bucket.
//! Data older than the newest recorded epoch is dropped, never reordered.
//!
//! A [`BufferRegistry`] owns every symbol buffer of one run. A registry fed
//! with fetched candles stores them as served and does not build candles
//! from its ticks.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use tracing::warn;

use super::candle::{bucket_start, Candle};
use super::spike::{SpikeEvent, SpikeTracker};
use super::symbol::SymbolConfiguration;
use super::tick::Tick;

pub const DEFAULT_TICK_CAPACITY: usize = 5_000;
pub const DEFAULT_CANDLE_CAPACITY: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferCapacity {
    pub ticks: usize,
    pub candles: usize,
}

impl Default for BufferCapacity {
    fn default() -> Self {
        BufferCapacity {
            ticks: DEFAULT_TICK_CAPACITY,
            candles: DEFAULT_CANDLE_CAPACITY,
        }
    }
}

/// Why a tick or candle was not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    OutOfOrder,
    Duplicate,
}

#[derive(Debug, Clone)]
pub struct SymbolBuffer {
    symbol: String,
    interval_secs: i64,
    capacity: BufferCapacity,
    ticks: VecDeque<Tick>,
    candles: VecDeque<Candle>,
    forming: Option<Candle>,
    aggregate: bool,
    max_tick_epoch: Option<i64>,
    last_tick_sequence: Option<u64>,
    max_candle_epoch: Option<i64>,
    rejected_ticks: u64,
    rejected_candles: u64,
}

impl SymbolBuffer {
    pub fn new(symbol: &str, interval_secs: i64, capacity: BufferCapacity) -> Self {
        SymbolBuffer {
            symbol: symbol.to_string(),
            interval_secs,
            capacity,
            ticks: VecDeque::with_capacity(capacity.ticks.min(DEFAULT_TICK_CAPACITY)),
            candles: VecDeque::with_capacity(capacity.candles.min(DEFAULT_CANDLE_CAPACITY)),
            forming: None,
            aggregate: true,
            max_tick_epoch: None,
            last_tick_sequence: None,
            max_candle_epoch: None,
            rejected_ticks: 0,
            rejected_candles: 0,
        }
    }

    /// Stops folding ticks into candles; candles arrive through
    /// [`add_candle`](Self::add_candle) only.
    pub fn without_aggregation(mut self) -> Self {
        self.aggregate = false;
        self
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Appends a tick, evicting the oldest once capacity is exceeded, and
    /// updates the in-progress candle.
    pub fn add_tick(&mut self, tick: Tick) -> Result<(), Rejection> {
        if let Some(max_epoch) = self.max_tick_epoch {
            if tick.epoch < max_epoch {
                self.rejected_ticks += 1;
                warn!(
                    symbol = %self.symbol,
                    epoch = tick.epoch,
                    max_epoch,
                    "dropping out-of-order tick"
                );
                return Err(Rejection::OutOfOrder);
            }
            if tick.epoch == max_epoch && self.last_tick_sequence == Some(tick.sequence) {
                self.rejected_ticks += 1;
                warn!(
                    symbol = %self.symbol,
                    epoch = tick.epoch,
                    sequence = tick.sequence,
                    "dropping duplicate tick"
                );
                return Err(Rejection::Duplicate);
            }
        }

        self.max_tick_epoch = Some(tick.epoch);
        self.last_tick_sequence = Some(tick.sequence);
        if self.aggregate {
            self.fold_into_candle(&tick);
        }

        self.ticks.push_back(tick);
        while self.ticks.len() > self.capacity.ticks {
            self.ticks.pop_front();
        }
        Ok(())
    }

    /// Appends a finished candle, evicting the oldest once capacity is exceeded.
    pub fn add_candle(&mut self, candle: Candle) -> Result<(), Rejection> {
        if let Some(max_epoch) = self.max_candle_epoch {
            if candle.epoch < max_epoch {
                self.rejected_candles += 1;
                warn!(
                    symbol = %self.symbol,
                    epoch = candle.epoch,
                    max_epoch,
                    "dropping out-of-order candle"
                );
                return Err(Rejection::OutOfOrder);
            }
            if candle.epoch == max_epoch {
                self.rejected_candles += 1;
                warn!(symbol = %self.symbol, epoch = candle.epoch, "dropping duplicate candle");
                return Err(Rejection::Duplicate);
            }
        }

        self.max_candle_epoch = Some(candle.epoch);
        self.candles.push_back(candle);
        while self.candles.len() > self.capacity.candles {
            self.candles.pop_front();
        }
        Ok(())
    }

    fn fold_into_candle(&mut self, tick: &Tick) {
        let start = bucket_start(tick.epoch, self.interval_secs);
        if let Some(candle) = self.forming.as_mut() {
            if candle.epoch == start {
                candle.absorb(tick.price);
                return;
            }
        }

        let next = Candle::from_tick(tick, self.interval_secs);
        if let Some(done) = self.forming.replace(next) {
            // Ordering is already guaranteed by the tick check.
            let _ = self.add_candle(done);
        }
    }

    pub fn ticks(&self) -> &VecDeque<Tick> {
        &self.ticks
    }

    pub fn candles(&self) -> &VecDeque<Candle> {
        &self.candles
    }

    pub fn forming_candle(&self) -> Option<&Candle> {
        self.forming.as_ref()
    }

    pub fn last_tick(&self) -> Option<&Tick> {
        self.ticks.back()
    }

    /// Copy of the last `n` finished candles, oldest first.
    pub fn recent_candles(&self, n: usize) -> Vec<Candle> {
        let skip = self.candles.len().saturating_sub(n);
        self.candles.iter().skip(skip).cloned().collect()
    }

    /// Copy of the last `n` tick prices, oldest first.
    pub fn recent_prices(&self, n: usize) -> Vec<f64> {
        let skip = self.ticks.len().saturating_sub(n);
        self.ticks.iter().skip(skip).map(|t| t.price).collect()
    }

    pub fn rejected_ticks(&self) -> u64 {
        self.rejected_ticks
    }

    pub fn rejected_candles(&self) -> u64 {
        self.rejected_candles
    }
}

/// Result of routing a tick through the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum Ingest {
    Stored { spike: Option<SpikeEvent> },
    Rejected(Rejection),
}

/// All buffers and spike trackers belonging to one run.
#[derive(Debug, Clone)]
pub struct BufferRegistry {
    interval_secs: i64,
    capacity: BufferCapacity,
    aggregate: bool,
    buffers: HashMap<String, SymbolBuffer>,
    trackers: HashMap<String, SpikeTracker>,
}

impl BufferRegistry {
    pub fn new(interval_secs: i64, capacity: BufferCapacity) -> Self {
        BufferRegistry {
            interval_secs,
            capacity,
            aggregate: true,
            buffers: HashMap::new(),
            trackers: HashMap::new(),
        }
    }

    /// Registry whose candles come from a historical fetch, not from ticks.
    pub fn with_fetched_candles(capacity: BufferCapacity) -> Self {
        BufferRegistry {
            aggregate: false,
            ..BufferRegistry::new(0, capacity)
        }
    }

    fn buffer_mut(&mut self, symbol: &str) -> &mut SymbolBuffer {
        let (interval, capacity, aggregate) = (self.interval_secs, self.capacity, self.aggregate);
        self.buffers.entry(symbol.to_string()).or_insert_with(|| {
            let buffer = SymbolBuffer::new(symbol, interval, capacity);
            if aggregate {
                buffer
            } else {
                buffer.without_aggregation()
            }
        })
    }

    /// Stores a tick and, for spike-prone symbols, advances the spike tracker.
    /// Rejected ticks never reach the tracker.
    pub fn ingest(&mut self, tick: Tick) -> Ingest {
        let symbol = tick.symbol.clone();
        let stored = tick.clone();
        if let Err(rejection) = self.buffer_mut(&symbol).add_tick(tick) {
            return Ingest::Rejected(rejection);
        }

        let tracker = match self.trackers.entry(symbol) {
            Entry::Occupied(entry) => Some(entry.into_mut()),
            Entry::Vacant(entry) => SymbolConfiguration::for_symbol(entry.key())
                .spike
                .map(|profile| entry.insert(SpikeTracker::new(profile))),
        };
        let spike = tracker.and_then(|t| t.on_tick(&stored));

        Ingest::Stored { spike }
    }

    pub fn add_candle(&mut self, candle: Candle) -> Result<(), Rejection> {
        let symbol = candle.symbol.clone();
        self.buffer_mut(&symbol).add_candle(candle)
    }

    pub fn buffer(&self, symbol: &str) -> Option<&SymbolBuffer> {
        self.buffers.get(symbol)
    }

    pub fn spike_tracker(&self, symbol: &str) -> Option<&SpikeTracker> {
        self.trackers.get(symbol)
    }
}
