//! Standard (z-score) scaler: `(x - mean) / scale` per column.

use crate::models::InferenceError;
use crate::models::model::FeatureScaler;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, InferenceError> {
        let scaler = Self { mean, scale };
        scaler.validate()?;
        Ok(scaler)
    }

    pub fn validate(&self) -> Result<(), InferenceError> {
        if self.mean.len() != self.scale.len() {
            return Err(InferenceError::DimensionMismatch {
                expected: self.mean.len(),
                got: self.scale.len(),
            });
        }
        Ok(())
    }

    pub fn width(&self) -> usize {
        self.mean.len()
    }
}

impl FeatureScaler for StandardScaler {
    fn transform(&self, row: &[f64]) -> Result<Vec<f64>, InferenceError> {
        if row.len() != self.width() {
            return Err(InferenceError::DimensionMismatch {
                expected: self.width(),
                got: row.len(),
            });
        }
        Ok(row
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (mean, scale))| {
                // Constant columns were fit with zero variance.
                let scale = if *scale == 0.0 { 1.0 } else { *scale };
                (x - mean) / scale
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_uses_stored_parameters() {
        let scaler = StandardScaler::new(vec![10.0, 0.0], vec![2.0, 4.0]).expect("valid scaler");

        let scaled = scaler.transform(&[14.0, -8.0]).expect("transform");

        assert_eq!(scaled, vec![2.0, -2.0]);
    }

    #[test]
    fn zero_scale_column_is_only_centered() {
        let scaler = StandardScaler::new(vec![2016.0], vec![0.0]).expect("valid scaler");

        let scaled = scaler.transform(&[2016.0]).expect("transform");

        assert_eq!(scaled, vec![0.0]);
    }

    #[test]
    fn width_mismatch_is_reported() {
        let scaler = StandardScaler::new(vec![0.0; 13], vec![1.0; 13]).expect("valid scaler");

        let err = scaler.transform(&[1.0, 2.0]).unwrap_err();

        assert_eq!(
            err,
            InferenceError::DimensionMismatch {
                expected: 13,
                got: 2
            }
        );
    }

    #[test]
    fn mismatched_parameter_lengths_are_rejected() {
        assert!(StandardScaler::new(vec![0.0; 3], vec![1.0; 2]).is_err());
    }
}
