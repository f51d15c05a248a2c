//! Core domain types and logic.

pub mod backtest;
pub mod buffer;
pub mod candle;
pub mod config_validation;
pub mod error;
pub mod features;
pub mod gate;
pub mod history;
pub mod indicator;
pub mod metrics;
pub mod position;
pub mod prediction;
pub mod regime;
pub mod spike;
pub mod symbol;
pub mod tick;
pub mod timeframe;
pub mod validation;
