//! Prediction oracle port.

use crate::domain::error::SynthError;
use crate::domain::prediction::{OracleRequest, Prediction};

/// Decides direction, confidence and trade levels for one signal request.
///
/// Implementations own their timeout; a timed-out call returns
/// [`SynthError::Oracle`]. Failures are never replaced with a default
/// prediction.
pub trait PredictionOracle {
    fn predict(&self, request: &OracleRequest) -> Result<Prediction, SynthError>;
}
