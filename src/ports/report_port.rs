//! Report generation port trait.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::SynthError;

/// Port for writing backtest reports.
pub trait ReportPort {
    fn write(&self, result: &BacktestResult, output_path: &str) -> Result<(), SynthError>;
}
