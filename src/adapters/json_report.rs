//! JSON report adapter implementing ReportPort.
//!
//! Writes the full `BacktestResult` as pretty-printed JSON. Non-finite
//! floats (an infinite profit factor) serialize as `null`.

use std::fs;
use std::path::Path;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::SynthError;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Default)]
pub struct JsonReportAdapter;

impl JsonReportAdapter {
    pub fn new() -> Self {
        JsonReportAdapter
    }

    pub fn render(result: &BacktestResult) -> Result<String, SynthError> {
        serde_json::to_string_pretty(result).map_err(|e| SynthError::Report {
            reason: e.to_string(),
        })
    }
}

impl ReportPort for JsonReportAdapter {
    fn write(&self, result: &BacktestResult, output_path: &str) -> Result<(), SynthError> {
        let json = Self::render(result)?;

        let path = Path::new(output_path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| SynthError::Report {
                    reason: format!("cannot create {}: {}", parent.display(), e),
                })?;
            }
        }
        fs::write(path, json).map_err(|e| SynthError::Report {
            reason: format!("cannot write {output_path}: {e}"),
        })
    }
}
