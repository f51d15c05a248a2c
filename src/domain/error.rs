//! Domain error types.

/// Top-level error type for synthtrader.
#[derive(Debug, thiserror::Error)]
pub enum SynthError {
    #[error("no historical data for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("data integrity violation at record {index}: {reason}")]
    DataIntegrity { index: usize, reason: String },

    #[error("market data request failed: {reason}")]
    MarketData { reason: String },

    #[error("prediction oracle failed: {reason}")]
    Oracle { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SynthError {
    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        SynthError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn missing(section: &str, key: &str) -> Self {
        SynthError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }
    }

    /// True for configuration problems detected before a run starts.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            SynthError::ConfigParse { .. }
                | SynthError::ConfigMissing { .. }
                | SynthError::ConfigInvalid { .. }
        )
    }
}

impl From<&SynthError> for std::process::ExitCode {
    fn from(err: &SynthError) -> Self {
        let code: u8 = match err {
            SynthError::Io(_) | SynthError::Report { .. } => 1,
            SynthError::ConfigParse { .. }
            | SynthError::ConfigMissing { .. }
            | SynthError::ConfigInvalid { .. } => 2,
            SynthError::MarketData { .. } | SynthError::DataUnavailable { .. } => 3,
            SynthError::DataIntegrity { .. } => 4,
            SynthError::Oracle { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
