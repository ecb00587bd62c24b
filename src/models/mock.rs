use crate::models::InferenceError;
use crate::models::model::{FeatureScaler, OccupancyModel};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Always predict the same value.
    Constant(f64),
    /// Predict the n-th scripted value on the n-th call, repeating the last.
    Scripted(Vec<f64>),
    /// Predict the value of one input column.
    EchoColumn(usize),
    /// Fail every call.
    Fail,
    /// Panic on every call.
    Panic,
}

/// Test model that records every row it is asked to predict.
#[derive(Debug)]
pub struct MockModel {
    behavior: MockBehavior,
    calls: Mutex<Vec<Vec<f64>>>,
}

impl MockModel {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn constant(value: f64) -> Self {
        Self::new(MockBehavior::Constant(value))
    }

    pub fn scripted(values: Vec<f64>) -> Self {
        Self::new(MockBehavior::Scripted(values))
    }

    pub fn echo_column(column: usize) -> Self {
        Self::new(MockBehavior::EchoColumn(column))
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Fail)
    }

    pub fn panicking() -> Self {
        Self::new(MockBehavior::Panic)
    }

    /// Rows seen so far, in call order.
    pub fn recorded_rows(&self) -> Vec<Vec<f64>> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

impl OccupancyModel for MockModel {
    fn predict(&self, row: &[f64]) -> Result<f64, InferenceError> {
        let call_index = {
            let mut calls = self
                .calls
                .lock()
                .map_err(|_| InferenceError::Failed("mock lock poisoned".to_string()))?;
            calls.push(row.to_vec());
            calls.len() - 1
        };

        match &self.behavior {
            MockBehavior::Constant(value) => Ok(*value),
            MockBehavior::Scripted(values) => values
                .get(call_index)
                .or_else(|| values.last())
                .copied()
                .ok_or_else(|| InferenceError::Failed("mock script is empty".to_string())),
            MockBehavior::EchoColumn(column) => {
                row.get(*column)
                    .copied()
                    .ok_or(InferenceError::DimensionMismatch {
                        expected: column + 1,
                        got: row.len(),
                    })
            }
            MockBehavior::Fail => Err(InferenceError::Failed("mock predict failed".to_string())),
            MockBehavior::Panic => panic!("mock predict panicked"),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Scaler that passes rows through unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityScaler;

impl FeatureScaler for IdentityScaler {
    fn transform(&self, row: &[f64]) -> Result<Vec<f64>, InferenceError> {
        Ok(row.to_vec())
    }
}

/// Scaler that rejects every row.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingScaler;

impl FeatureScaler for FailingScaler {
    fn transform(&self, _row: &[f64]) -> Result<Vec<f64>, InferenceError> {
        Err(InferenceError::Failed("mock transform failed".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_model_repeats_last_value() {
        let model = MockModel::scripted(vec![1.0, 2.0]);

        let outputs: Vec<f64> = (0..3)
            .map(|_| model.predict(&[0.0]).expect("predict ok"))
            .collect();

        assert_eq!(outputs, vec![1.0, 2.0, 2.0]);
        assert_eq!(model.recorded_rows().len(), 3);
    }

    #[test]
    fn failing_model_reports_error() {
        let model = MockModel::failing();

        let err = model.predict(&[0.0]).unwrap_err();

        assert_eq!(err.to_string(), "mock predict failed");
    }
}
