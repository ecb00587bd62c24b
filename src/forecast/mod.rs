use crate::artifacts::{ArtifactPaths, ArtifactStore, load_from_paths};
use crate::error::ForecastError;
use time::{Duration, PrimitiveDateTime};
use tracing::{info, warn};

pub mod aggregate;
pub mod autoregressive;
pub mod features;
pub mod resolver;

use aggregate::{BatchForecast, forecast_all};
use resolver::resolve_input;

/// Availability forecast for every location up to one target timestamp.
#[derive(Debug)]
pub struct ForecastRun {
    pub target: PrimitiveDateTime,
    pub steps: usize,
    pub availability: BatchForecast,
}

/// Resolve the requested date and time, forecast every location and convert
/// the result to availability.
///
/// A bad date or time aborts before any location is touched; per-location
/// failures are collected in the returned batch.
pub fn run_forecast(
    store: &ArtifactStore,
    date: &str,
    time: &str,
    workers: usize,
) -> Result<ForecastRun, ForecastError> {
    let (target, steps) = match resolve_input(date, time, store.index()) {
        Ok(resolved) => resolved,
        Err(err) => {
            warn!(date, time, error = %err, "Rejected forecast request");
            return Err(err);
        }
    };
    info!(
        target_time = %target,
        steps,
        locations = store.locations().len(),
        "Running forecast"
    );

    let occupancy = forecast_all(steps, store.index(), store.locations(), workers);
    Ok(ForecastRun {
        target,
        steps,
        availability: occupancy.into_availability(),
    })
}

/// Load the artifacts at `paths` and run a single forecast against them.
pub fn run_forecast_from_paths(
    paths: &ArtifactPaths,
    cadence: Duration,
    date: &str,
    time: &str,
    workers: usize,
) -> Result<ForecastRun, ForecastError> {
    let store = load_from_paths(paths, cadence)?;
    run_forecast(&store, date, time, workers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LookupFailure;
    use crate::forecast::aggregate::LocationArtifacts;
    use crate::forecast::resolver::ForecastIndex;
    use crate::models::mock::{IdentityScaler, MockModel};
    use crate::series::{Observation, TimeSeries};
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use time::macros::datetime;

    fn store(models: Vec<Arc<MockModel>>) -> ArtifactStore {
        let cadence = Duration::minutes(30);
        let train_start = datetime!(2016-12-12 08:00);
        let test_start = train_start + cadence * 20;
        let series = |start: PrimitiveDateTime, len: i32, value: f64| {
            let points = (0..len)
                .map(|i| Observation {
                    timestamp: start + cadence * i,
                    occupancy_rate: value,
                })
                .collect();
            TimeSeries::new(points, cadence).expect("valid series")
        };
        let locations: Vec<LocationArtifacts> = models
            .into_iter()
            .enumerate()
            .map(|(i, model)| LocationArtifacts {
                location_id: i as u32 + 1,
                train: series(train_start, 20, 30.0),
                test: series(test_start, 6, 35.0),
                scaler: Arc::new(IdentityScaler),
                model,
            })
            .collect();
        let index = ForecastIndex::new(locations[0].test.timestamps().collect(), cadence)
            .expect("valid index");
        ArtifactStore::new(index, locations, BTreeMap::new()).expect("consistent store")
    }

    #[test]
    fn run_returns_availability_up_to_target() -> Result<(), ForecastError> {
        let store = store(vec![
            Arc::new(MockModel::constant(150.0)),
            Arc::new(MockModel::constant(25.0)),
        ]);

        // Index starts at 18:00; 19:00 is the third step.
        let run = run_forecast(&store, "2016-12-12", "19:00", 1)?;

        assert_eq!(run.steps, 3);
        assert_eq!(run.target, datetime!(2016-12-12 19:00));
        let first = &run.availability.bundles[&1];
        let second = &run.availability.bundles[&2];
        assert_eq!(first.forecast.values().collect::<Vec<_>>(), vec![0.0; 3]);
        assert_eq!(second.at_target(), Some(75.0));
        assert_eq!(first.train.values().next(), Some(70.0));
        Ok(())
    }

    #[test]
    fn bad_timestamp_aborts_before_forecasting() {
        let model = Arc::new(MockModel::constant(10.0));
        let store = store(vec![Arc::clone(&model)]);

        let err = run_forecast(&store, "2016-12-12", "23:00", 1).unwrap_err();

        assert!(matches!(
            err,
            ForecastError::TimestampNotFound {
                reason: LookupFailure::OutsideHorizon,
                ..
            }
        ));
        assert!(model.recorded_rows().is_empty());
    }
}
