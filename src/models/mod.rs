//! Fitted per-location scalers and regressors.
//!
//! Model kinds are selected by the `model` tag of each entry in the models
//! artifact file and built through [`create_model`].

use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

pub mod linear;
pub mod mock;
pub mod model;
pub mod scaler;
pub mod tree_ensemble;

use linear::{LinearModel, LinearParams};
use model::OccupancyModel;
use tree_ensemble::{TreeEnsembleModel, TreeEnsembleParams};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    #[error("expected {expected} features, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("model produced a non-finite value")]
    NonFiniteOutput,
    #[error("malformed tree {tree}: {reason}")]
    MalformedTree { tree: usize, reason: String },
    #[error("{0}")]
    Failed(String),
}

/// One entry of the models artifact file.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelFile {
    pub model: String,
    pub params: serde_json::Value,
}

#[derive(Debug, Error)]
pub enum ModelSpecError {
    #[error("invalid model parameters: {0}")]
    Params(#[from] serde_json::Error),
    #[error("invalid model: {0}")]
    Invalid(#[from] InferenceError),
    #[error("unknown model: {0}")]
    Unknown(String),
}

// Model Factory
pub fn create_model(spec: &ModelFile) -> Result<Arc<dyn OccupancyModel>, ModelSpecError> {
    match spec.model.as_str() {
        "linear" => {
            let params: LinearParams = serde_json::from_value(spec.params.clone())?;
            Ok(Arc::new(LinearModel::new(params)))
        }
        "tree_ensemble" => {
            let params: TreeEnsembleParams = serde_json::from_value(spec.params.clone())?;
            Ok(Arc::new(TreeEnsembleModel::new(params)?))
        }
        other => Err(ModelSpecError::Unknown(other.to_string())),
    }
}
