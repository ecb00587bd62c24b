//! Runs the forecaster for every location and converts the results to
//! availability.

use crate::error::ForecastError;
use crate::forecast::autoregressive;
use crate::forecast::resolver::ForecastIndex;
use crate::models::model::{FeatureScaler, OccupancyModel};
use crate::series::{LocationId, Observation, TimeSeries};
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{info, warn};

/// Availability of a completely empty lot.
pub const FULL_AVAILABILITY: f64 = 100.0;

/// Everything needed to forecast one location.
#[derive(Debug, Clone)]
pub struct LocationArtifacts {
    pub location_id: LocationId,
    pub train: TimeSeries,
    pub test: TimeSeries,
    pub scaler: Arc<dyn FeatureScaler>,
    pub model: Arc<dyn OccupancyModel>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastBundle {
    pub train: TimeSeries,
    pub test: TimeSeries,
    pub forecast: TimeSeries,
}

/// Historical tail and forecast for charting one location.
#[derive(Debug, Clone, PartialEq)]
pub struct Trend {
    pub historical: Vec<Observation>,
    pub forecast: Vec<Observation>,
}

impl ForecastBundle {
    /// Every value `v` becomes `100 - v`; nothing is clamped.
    pub fn to_availability(&self) -> Self {
        Self {
            train: self.train.map_values(availability_from_occupancy),
            test: self.test.map_values(availability_from_occupancy),
            forecast: self.forecast.map_values(availability_from_occupancy),
        }
    }

    /// Value at the requested target, the last forecast step.
    pub fn at_target(&self) -> Option<f64> {
        self.forecast.last().map(|p| p.occupancy_rate)
    }

    pub fn trend(&self, historical_points: usize) -> Trend {
        Trend {
            historical: self.train.tail(historical_points).to_vec(),
            forecast: self.forecast.points().to_vec(),
        }
    }
}

impl Trend {
    /// Complement of an availability trend, rounded to two decimals for
    /// charting occupancy.
    pub fn to_occupancy(&self) -> Self {
        let convert = |points: &[Observation]| {
            points
                .iter()
                .map(|p| Observation {
                    timestamp: p.timestamp,
                    occupancy_rate: round_percent(occupancy_from_availability(p.occupancy_rate)),
                })
                .collect()
        };
        Self {
            historical: convert(&self.historical),
            forecast: convert(&self.forecast),
        }
    }
}

pub fn availability_from_occupancy(value: f64) -> f64 {
    FULL_AVAILABILITY - value
}

pub fn occupancy_from_availability(value: f64) -> f64 {
    FULL_AVAILABILITY - value
}

fn round_percent(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Default)]
pub struct BatchForecast {
    pub bundles: BTreeMap<LocationId, ForecastBundle>,
    pub failures: BTreeMap<LocationId, ForecastError>,
}

impl BatchForecast {
    pub fn into_availability(self) -> Self {
        Self {
            bundles: self
                .bundles
                .into_iter()
                .map(|(id, bundle)| (id, bundle.to_availability()))
                .collect(),
            failures: self.failures,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, location_id: LocationId, outcome: Result<ForecastBundle, ForecastError>) {
        match outcome {
            Ok(bundle) => {
                self.bundles.insert(location_id, bundle);
            }
            Err(err) => {
                warn!(location_id, error = %err, "Forecast failed for location");
                self.failures.insert(location_id, err);
            }
        }
    }
}

/// Forecast one location and package its bundle.
pub fn forecast_location(
    steps: usize,
    index: &ForecastIndex,
    location: &LocationArtifacts,
) -> Result<ForecastBundle, ForecastError> {
    let extended = autoregressive::forecast(
        location.location_id,
        steps,
        index,
        &location.train,
        location.scaler.as_ref(),
        location.model.as_ref(),
    )?;
    Ok(ForecastBundle {
        train: location.train.clone(),
        test: location.test.clone(),
        forecast: extended.synthesized_series(),
    })
}

/// Run one location, turning a panic inside its model into `WorkerPanicked`.
fn forecast_isolated(
    steps: usize,
    index: &ForecastIndex,
    location: &LocationArtifacts,
) -> Result<ForecastBundle, ForecastError> {
    panic::catch_unwind(AssertUnwindSafe(|| forecast_location(steps, index, location)))
        .unwrap_or(Err(ForecastError::WorkerPanicked {
            location_id: location.location_id,
        }))
}

/// Forecast every location with a shared `steps`.
///
/// With `workers > 1` locations are split into contiguous chunks, one scoped
/// thread each. A failing or panicking location only lands in `failures`.
pub fn forecast_all(
    steps: usize,
    index: &ForecastIndex,
    locations: &[LocationArtifacts],
    workers: usize,
) -> BatchForecast {
    let mut batch = BatchForecast::default();

    if workers <= 1 || locations.len() <= 1 {
        for location in locations {
            batch.record(location.location_id, forecast_isolated(steps, index, location));
        }
    } else {
        let chunk_size = locations.len().div_ceil(workers);
        std::thread::scope(|scope| {
            let handles: Vec<_> = locations
                .chunks(chunk_size)
                .map(|chunk| {
                    let handle = scope.spawn(move || {
                        chunk
                            .iter()
                            .map(|location| {
                                (location.location_id, forecast_isolated(steps, index, location))
                            })
                            .collect::<Vec<_>>()
                    });
                    (chunk, handle)
                })
                .collect();

            for (chunk, handle) in handles {
                match handle.join() {
                    Ok(outcomes) => {
                        for (location_id, outcome) in outcomes {
                            batch.record(location_id, outcome);
                        }
                    }
                    Err(_) => {
                        for location in chunk {
                            batch.record(
                                location.location_id,
                                Err(ForecastError::WorkerPanicked {
                                    location_id: location.location_id,
                                }),
                            );
                        }
                    }
                }
            }
        });
    }

    info!(
        steps,
        forecasted = batch.bundles.len(),
        failed = batch.failures.len(),
        "Forecast batch complete"
    );
    batch
}
