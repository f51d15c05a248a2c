//! Spike tracking for Boom/Crash symbols.
//!
//! Counts ticks since the last abrupt single-tick move and turns the count
//! into a proximity ratio against the symbol's expected spike interval:
//!
//! - ratio = ticks_since_last_spike / expected_ticks
//! - SAFE (<0.6), WARNING (<0.8), DANGER (<0.95), IMMINENT (>=0.95)
//! - probability = 1 / (1 + e^(-10 * (ratio - 0.8)))

use serde::Serialize;
use std::collections::VecDeque;
use tracing::debug;

use super::symbol::SpikeProfile;
use super::tick::Tick;

const LOGISTIC_CENTER: f64 = 0.8;
const LOGISTIC_STEEPNESS: f64 = 10.0;
const MAX_RECORDED_SPIKES: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProximityState {
    Safe,
    Warning,
    Danger,
    Imminent,
}

impl ProximityState {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio < 0.6 {
            ProximityState::Safe
        } else if ratio < 0.8 {
            ProximityState::Warning
        } else if ratio < 0.95 {
            ProximityState::Danger
        } else {
            ProximityState::Imminent
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpikeEvent {
    pub sequence: u64,
    pub epoch: i64,
    /// Signed relative move of the spiking tick.
    pub magnitude: f64,
    /// Ticks that had elapsed since the previous spike.
    pub interval: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpikeAnalysis {
    pub ticks_since_last_spike: u64,
    pub expected_ticks: u32,
    pub proximity_ratio: f64,
    pub proximity_state: ProximityState,
    pub probability: f64,
    pub spikes_observed: usize,
    /// Mean interval between recorded spikes, when at least one was seen.
    pub average_interval: Option<f64>,
}

pub fn spike_probability(proximity_ratio: f64) -> f64 {
    1.0 / (1.0 + (-LOGISTIC_STEEPNESS * (proximity_ratio - LOGISTIC_CENTER)).exp())
}

/// Per-symbol spike state machine.
#[derive(Debug, Clone)]
pub struct SpikeTracker {
    profile: SpikeProfile,
    ticks_since_last_spike: u64,
    last_price: Option<f64>,
    events: VecDeque<SpikeEvent>,
}

impl SpikeTracker {
    pub fn new(profile: SpikeProfile) -> Self {
        SpikeTracker {
            profile,
            ticks_since_last_spike: 0,
            last_price: None,
            events: VecDeque::new(),
        }
    }

    /// Advances the counter by one tick, resetting it when the move from the
    /// previous tick exceeds the spike threshold.
    pub fn on_tick(&mut self, tick: &Tick) -> Option<SpikeEvent> {
        let prev = self.last_price.replace(tick.price);

        let change = match prev {
            Some(prev_price) => tick.relative_change(prev_price),
            None => 0.0,
        };

        if change.abs() > self.profile.threshold {
            let event = SpikeEvent {
                sequence: tick.sequence,
                epoch: tick.epoch,
                magnitude: change,
                interval: self.ticks_since_last_spike,
            };
            debug!(
                symbol = %tick.symbol,
                sequence = tick.sequence,
                magnitude = change,
                interval = self.ticks_since_last_spike,
                "spike detected"
            );
            self.ticks_since_last_spike = 0;
            if self.events.len() == MAX_RECORDED_SPIKES {
                self.events.pop_front();
            }
            self.events.push_back(event.clone());
            Some(event)
        } else {
            self.ticks_since_last_spike += 1;
            None
        }
    }

    pub fn ticks_since_last_spike(&self) -> u64 {
        self.ticks_since_last_spike
    }

    pub fn analysis(&self) -> SpikeAnalysis {
        let expected = self.profile.expected_ticks.max(1);
        let ratio = self.ticks_since_last_spike as f64 / expected as f64;

        // The first recorded interval only measures time since replay start.
        let intervals: Vec<u64> = self.events.iter().skip(1).map(|e| e.interval).collect();
        let average_interval = if intervals.is_empty() {
            None
        } else {
            Some(intervals.iter().sum::<u64>() as f64 / intervals.len() as f64)
        };

        SpikeAnalysis {
            ticks_since_last_spike: self.ticks_since_last_spike,
            expected_ticks: self.profile.expected_ticks,
            proximity_ratio: ratio,
            proximity_state: ProximityState::from_ratio(ratio),
            probability: spike_probability(ratio),
            spikes_observed: self.events.len(),
            average_interval,
        }
    }
}
