//! Capability traits for fitted feature scalers and occupancy regressors.
//!
//! Any fitted model or scaler that satisfies these traits can be plugged into
//! the forecaster. Concrete implementations are selected per location by the
//! `model` tag in the models artifact file.

use crate::models::InferenceError;

/// A scaler whose parameters were learned at training time.
pub trait FeatureScaler: Send + Sync + std::fmt::Debug {
    /// Scale one feature row using the stored parameters. Never refits.
    fn transform(&self, row: &[f64]) -> Result<Vec<f64>, InferenceError>;
}

/// A regressor mapping a scaled feature row to an occupancy rate.
pub trait OccupancyModel: Send + Sync + std::fmt::Debug {
    /// Predict occupancy (percent, unclamped) for one scaled row.
    fn predict(&self, row: &[f64]) -> Result<f64, InferenceError>;

    /// Short identifier used in logs.
    fn name(&self) -> &'static str;
}
