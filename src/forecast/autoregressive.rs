//! Recursive multi-step occupancy forecasting for a single location.
//!
//! Each step builds a feature row from the target timestamp and from lags of
//! the working series, predicts, clamps the prediction to [0, 100] and appends
//! it so that later steps read it back as a lag.

use crate::error::ForecastError;
use crate::forecast::features::{
    CalendarFeatures, FeatureVector, LAG_OFFSETS, MIN_HISTORY, lag_features,
};
use crate::forecast::resolver::ForecastIndex;
use crate::models::InferenceError;
use crate::models::model::{FeatureScaler, OccupancyModel};
use crate::series::{LocationId, Observation, TimeSeries};
use time::PrimitiveDateTime;
use tracing::debug;

pub const OCCUPANCY_MIN: f64 = 0.0;
pub const OCCUPANCY_MAX: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastRow {
    pub timestamp: PrimitiveDateTime,
    pub occupancy_rate: f64,
    /// Present only for synthesized rows.
    pub features: Option<FeatureVector>,
}

/// Historical rows followed by synthesized rows, addressed by position.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtendedSeries {
    rows: Vec<ForecastRow>,
    // Kept alongside `rows` so lag reads stay a slice index.
    values: Vec<f64>,
    historical_len: usize,
}

impl ExtendedSeries {
    fn from_history(historical: &TimeSeries, steps: usize) -> Self {
        let mut rows = Vec::with_capacity(historical.len() + steps);
        let mut values = Vec::with_capacity(historical.len() + steps);
        for point in historical.points() {
            rows.push(ForecastRow {
                timestamp: point.timestamp,
                occupancy_rate: point.occupancy_rate,
                features: None,
            });
            values.push(point.occupancy_rate);
        }
        Self {
            rows,
            values,
            historical_len: historical.len(),
        }
    }

    fn push(&mut self, row: ForecastRow) {
        self.values.push(row.occupancy_rate);
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[ForecastRow] {
        &self.rows
    }

    pub fn historical_len(&self) -> usize {
        self.historical_len
    }

    /// Only the rows produced by the forecaster.
    pub fn synthesized(&self) -> &[ForecastRow] {
        &self.rows[self.historical_len..]
    }

    pub fn synthesized_series(&self) -> TimeSeries {
        TimeSeries::from_trusted(
            self.synthesized()
                .iter()
                .map(|row| Observation {
                    timestamp: row.timestamp,
                    occupancy_rate: row.occupancy_rate,
                })
                .collect(),
        )
    }
}

pub fn clamp_occupancy(value: f64) -> f64 {
    value.clamp(OCCUPANCY_MIN, OCCUPANCY_MAX)
}

/// Forecast `steps` values for one location along `index`.
///
/// The caller's series is never modified. Steps run strictly in order since
/// each one reads the previous predictions as lags.
pub fn forecast(
    location_id: LocationId,
    steps: usize,
    index: &ForecastIndex,
    historical: &TimeSeries,
    scaler: &dyn FeatureScaler,
    model: &dyn OccupancyModel,
) -> Result<ExtendedSeries, ForecastError> {
    if steps > index.len() {
        return Err(ForecastError::HorizonExceedsIndex {
            steps,
            available: index.len(),
        });
    }

    let mut working = ExtendedSeries::from_history(historical, steps);
    for (step, target) in index.timestamps().iter().take(steps).enumerate() {
        let lags = lag_features(&working.values).ok_or(ForecastError::InsufficientHistory {
            location_id,
            needed: MIN_HISTORY,
            got: working.len(),
        })?;
        let features = FeatureVector {
            calendar: CalendarFeatures::from_timestamp(*target),
            lags,
        };

        let inference_error = |cause| ForecastError::ModelInference {
            location_id,
            step,
            cause,
        };
        let scaled = scaler
            .transform(&features.to_row())
            .map_err(inference_error)?;
        let raw = model.predict(&scaled).map_err(inference_error)?;
        if raw.is_nan() {
            return Err(inference_error(InferenceError::NonFiniteOutput));
        }
        let occupancy_rate = clamp_occupancy(raw);

        debug!(
            location_id,
            step,
            lag_1 = features.lag(LAG_OFFSETS[0]),
            raw,
            occupancy_rate,
            "Forecast step"
        );

        working.push(ForecastRow {
            timestamp: *target,
            occupancy_rate,
            features: Some(features),
        });
    }

    Ok(working)
}
