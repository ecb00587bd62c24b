use crate::artifacts::ArtifactError;
use crate::models::InferenceError;
use crate::series::LocationId;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("watch channel send failed")]
    WatchSend,
    #[error("state lock poisoned")]
    StateLock,
}

/// Why a requested target could not be mapped onto the forecast index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupFailure {
    Malformed,
    OutsideHorizon,
    OffCadence,
    NotInIndex,
}

impl fmt::Display for LookupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupFailure::Malformed => write!(f, "malformed date or time"),
            LookupFailure::OutsideHorizon => write!(f, "outside the forecast horizon"),
            LookupFailure::OffCadence => write!(f, "not aligned to the forecast cadence"),
            LookupFailure::NotInIndex => write!(f, "no forecast step at that time"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("timestamp {requested} not found: {reason}")]
    TimestampNotFound {
        requested: String,
        reason: LookupFailure,
    },
    #[error("location {location_id}: insufficient history, need {needed} rows, got {got}")]
    InsufficientHistory {
        location_id: LocationId,
        needed: usize,
        got: usize,
    },
    #[error("location {location_id}: inference failed at step {step}: {cause}")]
    ModelInference {
        location_id: LocationId,
        step: usize,
        cause: InferenceError,
    },
    #[error("location {location_id}: forecast worker panicked")]
    WorkerPanicked { location_id: LocationId },
    #[error("requested {steps} steps but the forecast index has {available}")]
    HorizonExceedsIndex { steps: usize, available: usize },
    #[error("artifact load failed: {0}")]
    ArtifactLoad(#[from] ArtifactError),
}

impl ForecastError {
    /// Location the failure belongs to, if it is a per-location failure.
    pub fn location_id(&self) -> Option<LocationId> {
        match self {
            ForecastError::InsufficientHistory { location_id, .. }
            | ForecastError::ModelInference { location_id, .. }
            | ForecastError::WorkerPanicked { location_id } => Some(*location_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_not_found_names_input_and_reason() {
        let err = ForecastError::TimestampNotFound {
            requested: "2016-12-14 15:45".to_string(),
            reason: LookupFailure::OffCadence,
        };

        assert_eq!(
            err.to_string(),
            "timestamp 2016-12-14 15:45 not found: not aligned to the forecast cadence"
        );
        assert_eq!(err.location_id(), None);
    }

    #[test]
    fn model_inference_carries_location() {
        let err = ForecastError::ModelInference {
            location_id: 7,
            step: 2,
            cause: InferenceError::NonFiniteOutput,
        };

        assert_eq!(err.location_id(), Some(7));
        assert_eq!(
            err.to_string(),
            "location 7: inference failed at step 2: model produced a non-finite value"
        );
    }
}
