//! Maps a user-selected date and time onto the shared forecast index.

use crate::error::{ForecastError, LookupFailure};
use crate::series::{SeriesError, check_timeline, format_timestamp};
use time::macros::format_description;
use time::{Date, Duration, PrimitiveDateTime, Time};

/// Canonical future timestamps shared by every location.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastIndex {
    timestamps: Vec<PrimitiveDateTime>,
    cadence: Duration,
}

impl ForecastIndex {
    pub fn new(timestamps: Vec<PrimitiveDateTime>, cadence: Duration) -> Result<Self, SeriesError> {
        check_timeline(timestamps.iter().copied(), cadence)?;
        Ok(Self {
            timestamps,
            cadence,
        })
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<PrimitiveDateTime> {
        self.timestamps.get(position).copied()
    }

    pub fn timestamps(&self) -> &[PrimitiveDateTime] {
        &self.timestamps
    }

    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    pub fn start(&self) -> Option<PrimitiveDateTime> {
        self.timestamps.first().copied()
    }

    pub fn end(&self) -> Option<PrimitiveDateTime> {
        self.timestamps.last().copied()
    }

    /// Zero-based position of an exact match.
    pub fn position_of(&self, timestamp: PrimitiveDateTime) -> Option<usize> {
        self.timestamps.binary_search(&timestamp).ok()
    }

    /// Distinct calendar dates covered by the horizon, in order.
    pub fn dates(&self) -> Vec<Date> {
        let mut dates: Vec<Date> = self.timestamps.iter().map(|ts| ts.date()).collect();
        dates.dedup();
        dates
    }

    /// Distinct times of day that carry a forecast step, in order.
    pub fn times_of_day(&self) -> Vec<Time> {
        let mut times: Vec<Time> = self.timestamps.iter().map(|ts| ts.time()).collect();
        times.sort();
        times.dedup();
        times
    }

    fn classify_miss(&self, target: PrimitiveDateTime) -> LookupFailure {
        let (Some(start), Some(end)) = (self.start(), self.end()) else {
            return LookupFailure::OutsideHorizon;
        };
        if target < start || target > end {
            return LookupFailure::OutsideHorizon;
        }
        if (target - start).whole_seconds() % self.cadence.whole_seconds() != 0 {
            return LookupFailure::OffCadence;
        }
        LookupFailure::NotInIndex
    }
}

/// Combine a `YYYY-MM-DD` date and an `HH:MM` time of day.
pub fn parse_target(date: &str, time: &str) -> Result<PrimitiveDateTime, ForecastError> {
    let malformed = || ForecastError::TimestampNotFound {
        requested: format!("{} {}", date.trim(), time.trim()),
        reason: LookupFailure::Malformed,
    };
    let date = Date::parse(date.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|_| malformed())?;
    let time = Time::parse(time.trim(), format_description!("[hour]:[minute]"))
        .map_err(|_| malformed())?;
    Ok(PrimitiveDateTime::new(date, time))
}

/// Number of steps from the start of the horizon up to and including `target`.
pub fn resolve(target: PrimitiveDateTime, index: &ForecastIndex) -> Result<usize, ForecastError> {
    match index.position_of(target) {
        Some(position) => Ok(position + 1),
        None => Err(ForecastError::TimestampNotFound {
            requested: format_timestamp(target),
            reason: index.classify_miss(target),
        }),
    }
}

pub fn resolve_input(
    date: &str,
    time: &str,
    index: &ForecastIndex,
) -> Result<(PrimitiveDateTime, usize), ForecastError> {
    let target = parse_target(date, time)?;
    let steps = resolve(target, index)?;
    Ok((target, steps))
}
