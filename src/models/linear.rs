//! Linear regression model.
//!
//! Formula: occupancy = intercept + sum(coefficient_i * x_i)

use crate::models::InferenceError;
use crate::models::model::OccupancyModel;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LinearParams {
    pub coefficients: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
}

#[derive(Debug)]
pub struct LinearModel {
    pub params: LinearParams,
}

impl LinearModel {
    pub fn new(params: LinearParams) -> Self {
        Self { params }
    }
}

impl OccupancyModel for LinearModel {
    fn predict(&self, row: &[f64]) -> Result<f64, InferenceError> {
        if row.len() != self.params.coefficients.len() {
            return Err(InferenceError::DimensionMismatch {
                expected: self.params.coefficients.len(),
                got: row.len(),
            });
        }
        let dot: f64 = row
            .iter()
            .zip(&self.params.coefficients)
            .map(|(x, w)| x * w)
            .sum();
        Ok(self.params.intercept + dot)
    }

    fn name(&self) -> &'static str {
        "linear"
    }
}
