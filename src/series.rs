//! Occupancy time series with a fixed sampling cadence.
//!
//! Series may skip whole cadence slots (overnight session gaps) but every
//! timestamp must still land on the cadence grid of its predecessor.

use thiserror::Error;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Duration, PrimitiveDateTime};

pub type LocationId = u32;

/// Default sampling cadence of the source data.
pub const DEFAULT_CADENCE_MINUTES: i64 = 30;

/// Naive timestamp layout used in artifacts and API payloads.
pub const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub timestamp: PrimitiveDateTime,
    pub occupancy_rate: f64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SeriesError {
    #[error("cadence must be at least one second")]
    InvalidCadence,
    #[error("timestamp at position {position} does not increase")]
    NotIncreasing { position: usize },
    #[error("gap of {found_minutes} min at position {position} is not a multiple of {cadence_minutes} min")]
    IrregularGap {
        position: usize,
        found_minutes: i64,
        cadence_minutes: i64,
    },
    #[error("invalid timestamp {0:?}")]
    InvalidTimestamp(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    points: Vec<Observation>,
}

impl TimeSeries {
    pub fn new(points: Vec<Observation>, cadence: Duration) -> Result<Self, SeriesError> {
        check_timeline(points.iter().map(|p| p.timestamp), cadence)?;
        Ok(Self { points })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Observation] {
        &self.points
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.occupancy_rate)
    }

    pub fn timestamps(&self) -> impl Iterator<Item = PrimitiveDateTime> + '_ {
        self.points.iter().map(|p| p.timestamp)
    }

    pub fn last(&self) -> Option<&Observation> {
        self.points.last()
    }

    /// The trailing `count` observations (all of them when shorter).
    pub fn tail(&self, count: usize) -> &[Observation] {
        let start = self.points.len().saturating_sub(count);
        &self.points[start..]
    }

    /// Apply `f` to every value, keeping timestamps.
    pub fn map_values(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            points: self
                .points
                .iter()
                .map(|p| Observation {
                    timestamp: p.timestamp,
                    occupancy_rate: f(p.occupancy_rate),
                })
                .collect(),
        }
    }

    // Rows produced by the forecaster already sit on the index timeline.
    pub(crate) fn from_trusted(points: Vec<Observation>) -> Self {
        Self { points }
    }
}

/// Validate that timestamps strictly increase in whole multiples of `cadence`.
pub fn check_timeline(
    timestamps: impl IntoIterator<Item = PrimitiveDateTime>,
    cadence: Duration,
) -> Result<(), SeriesError> {
    let cadence_secs = cadence.whole_seconds();
    if cadence_secs < 1 {
        return Err(SeriesError::InvalidCadence);
    }
    let mut previous: Option<PrimitiveDateTime> = None;
    for (position, timestamp) in timestamps.into_iter().enumerate() {
        if let Some(prev) = previous {
            let gap = timestamp - prev;
            if !gap.is_positive() {
                return Err(SeriesError::NotIncreasing { position });
            }
            if gap.whole_seconds() % cadence_secs != 0 {
                return Err(SeriesError::IrregularGap {
                    position,
                    found_minutes: gap.whole_minutes(),
                    cadence_minutes: cadence.whole_minutes(),
                });
            }
        }
        previous = Some(timestamp);
    }
    Ok(())
}

pub fn parse_timestamp(raw: &str) -> Result<PrimitiveDateTime, SeriesError> {
    PrimitiveDateTime::parse(raw, TIMESTAMP_FORMAT)
        .map_err(|_| SeriesError::InvalidTimestamp(raw.to_string()))
}

pub fn format_timestamp(timestamp: PrimitiveDateTime) -> String {
    timestamp
        .format(TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| timestamp.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn obs(timestamp: PrimitiveDateTime, occupancy_rate: f64) -> Observation {
        Observation {
            timestamp,
            occupancy_rate,
        }
    }

    #[test]
    fn accepts_session_gaps_on_the_cadence_grid() {
        let points = vec![
            obs(datetime!(2016-12-12 16:00), 40.0),
            obs(datetime!(2016-12-12 16:30), 41.0),
            obs(datetime!(2016-12-13 08:00), 12.0),
        ];

        let series = TimeSeries::new(points, Duration::minutes(30)).expect("valid series");

        assert_eq!(series.len(), 3);
        assert_eq!(series.values().collect::<Vec<_>>(), vec![40.0, 41.0, 12.0]);
    }

    #[test]
    fn rejects_non_increasing_timestamps() {
        let points = vec![
            obs(datetime!(2016-12-12 16:00), 40.0),
            obs(datetime!(2016-12-12 16:00), 41.0),
        ];

        let err = TimeSeries::new(points, Duration::minutes(30)).unwrap_err();

        assert_eq!(err, SeriesError::NotIncreasing { position: 1 });
    }

    #[test]
    fn rejects_sub_second_cadence() {
        let points = vec![
            obs(datetime!(2016-12-12 16:00), 40.0),
            obs(datetime!(2016-12-12 16:30), 41.0),
        ];

        let err = TimeSeries::new(points, Duration::milliseconds(500)).unwrap_err();

        assert_eq!(err, SeriesError::InvalidCadence);
        assert_eq!(
            check_timeline([datetime!(2016-12-12 16:00)], Duration::ZERO),
            Err(SeriesError::InvalidCadence)
        );
    }

    #[test]
    fn rejects_off_grid_gap() {
        let points = vec![
            obs(datetime!(2016-12-12 16:00), 40.0),
            obs(datetime!(2016-12-12 16:45), 41.0),
        ];

        let err = TimeSeries::new(points, Duration::minutes(30)).unwrap_err();

        assert_eq!(
            err,
            SeriesError::IrregularGap {
                position: 1,
                found_minutes: 45,
                cadence_minutes: 30,
            }
        );
    }

    #[test]
    fn tail_is_bounded_by_length() {
        let points = vec![
            obs(datetime!(2016-12-12 08:00), 1.0),
            obs(datetime!(2016-12-12 08:30), 2.0),
            obs(datetime!(2016-12-12 09:00), 3.0),
        ];
        let series = TimeSeries::new(points, Duration::minutes(30)).expect("valid series");

        assert_eq!(series.tail(2).len(), 2);
        assert_eq!(series.tail(2)[0].occupancy_rate, 2.0);
        assert_eq!(series.tail(10).len(), 3);
    }

    #[test]
    fn timestamp_format_round_trips() {
        let ts = parse_timestamp("2016-12-14T15:30:00").expect("parse timestamp");

        assert_eq!(ts, datetime!(2016-12-14 15:30));
        assert_eq!(format_timestamp(ts), "2016-12-14T15:30:00");
        assert!(parse_timestamp("2016-12-14 15:30").is_err());
    }
}
