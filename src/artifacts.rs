//! Loading of frozen forecasting artifacts: per-location series, fitted
//! scalers, fitted models and optional lot metadata.
//!
//! The loader is responsible for the cross-location invariants the
//! forecaster relies on: every location has all three artifacts and every
//! held-out partition shares one forecast index.

use crate::forecast::aggregate::LocationArtifacts;
use crate::forecast::features::FEATURE_COUNT;
use crate::forecast::resolver::ForecastIndex;
use crate::models::model::FeatureScaler;
use crate::models::scaler::StandardScaler;
use crate::models::{InferenceError, ModelFile, ModelSpecError, create_model};
use crate::series::{LocationId, Observation, SeriesError, TimeSeries, parse_timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use time::Duration;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotInfo {
    pub location_id: LocationId,
    pub latitude: f64,
    pub longitude: f64,
    pub capacity: u32,
}

#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub series: PathBuf,
    pub scalers: PathBuf,
    pub models: PathBuf,
    pub lots: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("location {location_id} {partition} series: {source}")]
    Series {
        location_id: LocationId,
        partition: &'static str,
        source: SeriesError,
    },
    #[error("location {location_id} has no {kind}")]
    MissingArtifact {
        location_id: LocationId,
        kind: &'static str,
    },
    #[error("location {location_id} model: {source}")]
    Model {
        location_id: LocationId,
        source: ModelSpecError,
    },
    #[error("location {location_id} scaler: {source}")]
    Scaler {
        location_id: LocationId,
        source: InferenceError,
    },
    #[error("location {location_id} test index differs from the forecast index")]
    IndexMismatch { location_id: LocationId },
    #[error("forecast index: {0}")]
    Index(SeriesError),
    #[error("no locations in artifacts")]
    Empty,
}

/// Read-only artifact set shared by all forecast requests.
#[derive(Debug)]
pub struct ArtifactStore {
    index: ForecastIndex,
    locations: Vec<LocationArtifacts>,
    lots: BTreeMap<LocationId, LotInfo>,
}

impl ArtifactStore {
    pub fn new(
        index: ForecastIndex,
        locations: Vec<LocationArtifacts>,
        lots: BTreeMap<LocationId, LotInfo>,
    ) -> Result<Self, ArtifactError> {
        if locations.is_empty() {
            return Err(ArtifactError::Empty);
        }
        for location in &locations {
            if !location.test.timestamps().eq(index.timestamps().iter().copied()) {
                return Err(ArtifactError::IndexMismatch {
                    location_id: location.location_id,
                });
            }
        }
        Ok(Self {
            index,
            locations,
            lots,
        })
    }

    pub fn index(&self) -> &ForecastIndex {
        &self.index
    }

    pub fn locations(&self) -> &[LocationArtifacts] {
        &self.locations
    }

    pub fn location(&self, location_id: LocationId) -> Option<&LocationArtifacts> {
        self.locations
            .iter()
            .find(|location| location.location_id == location_id)
    }

    pub fn lot(&self, location_id: LocationId) -> Option<&LotInfo> {
        self.lots.get(&location_id)
    }
}

#[derive(Debug, Deserialize)]
struct SeriesFile {
    locations: BTreeMap<LocationId, PartitionsFile>,
}

#[derive(Debug, Deserialize)]
struct PartitionsFile {
    train: Vec<ObservationFile>,
    test: Vec<ObservationFile>,
}

#[derive(Debug, Deserialize)]
struct ObservationFile {
    timestamp: String,
    occupancy_rate: f64,
}

pub fn load_from_paths(
    paths: &ArtifactPaths,
    cadence: Duration,
) -> Result<ArtifactStore, ArtifactError> {
    let series: SeriesFile = read_json(&paths.series)?;
    let mut scalers: BTreeMap<LocationId, StandardScaler> = read_json(&paths.scalers)?;
    let mut models: BTreeMap<LocationId, ModelFile> = read_json(&paths.models)?;
    let lots: Vec<LotInfo> = match &paths.lots {
        Some(path) => read_json(path)?,
        None => Vec::new(),
    };

    let mut locations = Vec::with_capacity(series.locations.len());
    for (location_id, partitions) in series.locations {
        let scaler = scalers
            .remove(&location_id)
            .ok_or(ArtifactError::MissingArtifact {
                location_id,
                kind: "scaler",
            })?;
        let model_spec = models
            .remove(&location_id)
            .ok_or(ArtifactError::MissingArtifact {
                location_id,
                kind: "model",
            })?;
        locations.push(build_location(
            location_id,
            partitions,
            scaler,
            &model_spec,
            cadence,
        )?);
    }

    let first = locations.first().ok_or(ArtifactError::Empty)?;
    let index = ForecastIndex::new(first.test.timestamps().collect(), cadence)
        .map_err(ArtifactError::Index)?;
    let lots = lots
        .into_iter()
        .map(|lot| (lot.location_id, lot))
        .collect();
    let store = ArtifactStore::new(index, locations, lots)?;

    info!(
        locations = store.locations().len(),
        horizon = store.index().len(),
        "Artifacts loaded"
    );
    Ok(store)
}

fn build_location(
    location_id: LocationId,
    partitions: PartitionsFile,
    scaler: StandardScaler,
    model_spec: &ModelFile,
    cadence: Duration,
) -> Result<LocationArtifacts, ArtifactError> {
    let train = to_series(location_id, "train", partitions.train, cadence)?;
    let test = to_series(location_id, "test", partitions.test, cadence)?;

    let scaler_error = |source| ArtifactError::Scaler {
        location_id,
        source,
    };
    scaler.validate().map_err(scaler_error)?;
    if scaler.width() != FEATURE_COUNT {
        return Err(scaler_error(InferenceError::DimensionMismatch {
            expected: FEATURE_COUNT,
            got: scaler.width(),
        }));
    }
    let scaler: Arc<dyn FeatureScaler> = Arc::new(scaler);

    let model = create_model(model_spec).map_err(|source| ArtifactError::Model {
        location_id,
        source,
    })?;

    Ok(LocationArtifacts {
        location_id,
        train,
        test,
        scaler,
        model,
    })
}

fn to_series(
    location_id: LocationId,
    partition: &'static str,
    raw: Vec<ObservationFile>,
    cadence: Duration,
) -> Result<TimeSeries, ArtifactError> {
    let series_error = |source| ArtifactError::Series {
        location_id,
        partition,
        source,
    };
    let points = raw
        .into_iter()
        .map(|obs| {
            Ok(Observation {
                timestamp: parse_timestamp(&obs.timestamp)?,
                occupancy_rate: obs.occupancy_rate,
            })
        })
        .collect::<Result<Vec<_>, SeriesError>>()
        .map_err(series_error)?;
    TimeSeries::new(points, cadence).map_err(series_error)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ArtifactError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| ArtifactError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
